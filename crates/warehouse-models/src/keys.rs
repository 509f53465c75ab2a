//! Key derivation: from an entity's logical identity to its physical key.
//!
//! An entity is identified either by one natural attribute, stored as-is
//! as the hash key, or by an ordered list of attributes joined with `!`
//! into the canonical `key` attribute. A range key is always a single
//! attribute taken verbatim.
//!
//! The field order of a composite key and the delimiter are part of the
//! stored data's contract: changing either orphans existing items.

use serde_json::Value;
use warehouse_store::Record;

/// Attribute holding a composite hash key.
pub const KEY_FIELD: &str = "key";

/// Separator between composite key segments.
pub const DELIMITER: char = '!';

/// How the hash key of an entity is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKey {
    /// A single natural attribute, used as-is.
    Natural(&'static str),
    /// Ordered attributes joined with [`DELIMITER`] into [`KEY_FIELD`].
    Composite(&'static [&'static str]),
}

/// Derives physical keys for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDeriver {
    hash: HashKey,
    range_key: Option<&'static str>,
}

/// Physical key derived from an entity's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalKey {
    /// Name of the hash key attribute.
    pub hash_field: &'static str,
    /// Hash key value; `None` when a natural key attribute is absent.
    pub hash: Option<Value>,
    /// Range key attribute and value, when configured and present.
    pub range: Option<(&'static str, Value)>,
}

impl PhysicalKey {
    /// Hash key value as text, if it is a string.
    pub fn hash_str(&self) -> Option<&str> {
        self.hash.as_ref().and_then(Value::as_str)
    }

    /// The key attributes alone, as a record.
    pub fn into_record(self) -> Record {
        let mut record = Record::new();
        if let Some(hash) = self.hash {
            record.insert(self.hash_field.to_string(), hash);
        }
        if let Some((field, value)) = self.range {
            record.insert(field.to_string(), value);
        }
        record
    }
}

impl KeyDeriver {
    pub const fn natural(field: &'static str) -> Self {
        Self {
            hash: HashKey::Natural(field),
            range_key: None,
        }
    }

    pub const fn composite(fields: &'static [&'static str]) -> Self {
        Self {
            hash: HashKey::Composite(fields),
            range_key: None,
        }
    }

    pub const fn with_range(mut self, field: &'static str) -> Self {
        self.range_key = Some(field);
        self
    }

    pub fn hash(&self) -> HashKey {
        self.hash
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.hash, HashKey::Composite(_))
    }

    /// Name of the physical hash key attribute.
    pub fn hash_field(&self) -> &'static str {
        match self.hash {
            HashKey::Natural(field) => field,
            HashKey::Composite(_) => KEY_FIELD,
        }
    }

    pub fn range_key(&self) -> Option<&'static str> {
        self.range_key
    }

    /// Derive the physical key of `data`. Pure: no state, no I/O.
    pub fn derive(&self, data: &Record) -> PhysicalKey {
        let hash = match self.hash {
            HashKey::Natural(field) => data.get(field).filter(|v| !v.is_null()).cloned(),
            HashKey::Composite(fields) => Some(Value::String(compose(fields, data))),
        };
        let range = self.range_key.and_then(|field| {
            data.get(field)
                .filter(|v| is_present(v))
                .map(|v| (field, v.clone()))
        });
        PhysicalKey {
            hash_field: self.hash_field(),
            hash,
            range,
        }
    }
}

/// Join the values of `fields` in order. Absent values become empty segments.
pub fn compose(fields: &[&str], data: &Record) -> String {
    let segments: Vec<String> = fields
        .iter()
        .map(|field| segment(data.get(*field)))
        .collect();
    segments.join(&DELIMITER.to_string())
}

fn segment(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    const BUILD: KeyDeriver = KeyDeriver::composite(&["env", "name", "version"]).with_range("locale");

    #[test]
    fn composite_joins_in_order() {
        let data = record(json!({
            "name": "app", "env": "prod", "version": "1.0.0", "locale": "en-US"
        }));
        let key = BUILD.derive(&data);
        assert_eq!(key.hash_field, "key");
        assert_eq!(key.hash_str(), Some("prod!app!1.0.0"));
        assert_eq!(key.range, Some(("locale", json!("en-US"))));
    }

    #[test]
    fn derivation_is_deterministic() {
        let data = record(json!({ "env": "dev", "name": "app", "version": "2.0.0" }));
        assert_eq!(BUILD.derive(&data), BUILD.derive(&data));
    }

    #[test]
    fn field_order_changes_the_key() {
        let data = record(json!({ "env": "dev", "name": "app" }));
        let a = KeyDeriver::composite(&["env", "name"]).derive(&data);
        let b = KeyDeriver::composite(&["name", "env"]).derive(&data);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn missing_composite_field_yields_empty_segment() {
        let data = record(json!({ "env": "prod", "version": "1.0.0" }));
        assert_eq!(BUILD.derive(&data).hash_str(), Some("prod!!1.0.0"));
    }

    #[test]
    fn non_string_segments_use_json_text() {
        let data = record(json!({ "pkg": "a", "version": 3 }));
        let key = KeyDeriver::composite(&["pkg", "version"]).derive(&data);
        assert_eq!(key.hash_str(), Some("a!3"));
    }

    #[test]
    fn natural_key_is_identity() {
        let data = record(json!({ "fingerprint": "abc.gz", "url": "x" }));
        let key = KeyDeriver::natural("fingerprint").derive(&data);
        assert_eq!(key.into_record(), record(json!({ "fingerprint": "abc.gz" })));
    }

    #[test]
    fn natural_key_absent_is_none() {
        let key = KeyDeriver::natural("name").derive(&Record::new());
        assert!(key.hash.is_none());
    }

    #[test]
    fn empty_range_key_is_treated_as_absent() {
        let data = record(json!({ "env": "prod", "name": "a", "version": "1", "locale": "" }));
        assert!(BUILD.derive(&data).range.is_none());
    }
}
