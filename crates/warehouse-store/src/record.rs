//! Canonical record representation shared by every backend.
//!
//! Backends never leak their native item types: everything that crosses the
//! store boundary is a [`Record`], a plain JSON attribute mapping.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

/// Plain attribute mapping for one stored item.
pub type Record = serde_json::Map<String, Value>;

/// Physical key of one item: hash key plus optional range key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub hash: String,
    pub range: Option<String>,
}

impl ItemKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            range: None,
        }
    }

    pub fn with_range(hash: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            range: Some(range.into()),
        }
    }

    /// Storage key `"{hash}\0{range}"`. Items of one partition sort together.
    pub fn storage_key(&self) -> String {
        format!("{}\0{}", self.hash, self.range.as_deref().unwrap_or(""))
    }

    /// Inclusive start of the storage-key range covering one partition.
    pub fn partition_start(hash: &str) -> String {
        format!("{hash}\0")
    }

    /// Exclusive end of the storage-key range covering one partition.
    ///
    /// `\x01` sorts immediately after the `\0` separator, so
    /// `[start, end)` captures exactly the keys of the partition.
    pub fn partition_end(hash: &str) -> String {
        format!("{hash}\x01")
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}/{}", self.hash, range),
            None => f.write_str(&self.hash),
        }
    }
}

/// Encode raw bytes as a blob attribute value (base64 text).
pub fn blob(bytes: &[u8]) -> Value {
    Value::String(STANDARD.encode(bytes))
}

/// Decode a blob attribute value back into bytes.
pub fn decode_blob(value: &Value) -> Option<Vec<u8>> {
    value.as_str().and_then(|s| STANDARD.decode(s).ok())
}

/// Keep only the named attributes of a record.
pub fn project(record: Record, fields: &[String]) -> Record {
    record
        .into_iter()
        .filter(|(name, _)| fields.iter().any(|f| f == name))
        .collect()
}

/// Current unix time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn storage_key_sorts_inside_partition_bounds() {
        let key = ItemKey::with_range("prod!app!1.0.0", "en-US");
        let sk = key.storage_key();
        assert!(sk >= ItemKey::partition_start("prod!app!1.0.0"));
        assert!(sk < ItemKey::partition_end("prod!app!1.0.0"));

        // A longer hash sharing the prefix lands outside the partition.
        let other = ItemKey::with_range("prod!app!1.0.01", "en-US").storage_key();
        assert!(other >= ItemKey::partition_end("prod!app!1.0.0"));
    }

    #[test]
    fn blob_round_trip() {
        let value = blob(b"module.exports = 1;");
        assert_eq!(decode_blob(&value).unwrap(), b"module.exports = 1;");
        assert!(decode_blob(&json!("not base64!")).is_none());
    }

    #[test]
    fn project_keeps_requested_fields() {
        let record = json!({ "name": "a", "version": "1.0.0", "env": "prod" });
        let Value::Object(record) = record else { unreachable!() };
        let projected = project(record, &["name".to_string(), "env".to_string()]);
        assert_eq!(Value::Object(projected), json!({ "name": "a", "env": "prod" }));
    }

    #[test]
    fn display_includes_range() {
        assert_eq!(ItemKey::new("a.gz").to_string(), "a.gz");
        assert_eq!(ItemKey::with_range("dev!app", "en-US").to_string(), "dev!app/en-US");
    }
}
