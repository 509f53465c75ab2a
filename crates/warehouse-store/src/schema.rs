//! Table schemas and store-side schema enforcement.
//!
//! A [`TableSchema`] is static configuration: physical table name, hash key,
//! optional range key, whether the store stamps `createdAt`/`updatedAt`, and
//! the declared type of every attribute. The schema decides which item shapes
//! a table accepts; everything else about an entity lives above the store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::record::{ItemKey, Record, decode_blob};

/// Attribute stamped on the first write of an item.
pub const CREATED_AT: &str = "createdAt";

/// Attribute stamped on every write of an item.
pub const UPDATED_AT: &str = "updatedAt";

/// Declared type of a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    /// Unordered set of strings; duplicates are dropped on write.
    StringSet,
    /// Map of text to text (or null).
    StringMap,
    /// Any JSON value.
    Json,
    /// Binary content, carried as base64 text in the record view.
    Blob,
}

impl AttributeType {
    fn accepts(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::StringSet => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::StringMap => value
                .as_object()
                .is_some_and(|map| map.values().all(|v| v.is_string() || v.is_null())),
            Self::Json => true,
            Self::Blob => decode_blob(value).is_some(),
        }
    }
}

/// Schema of one physical table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    hash_key: String,
    range_key: Option<String>,
    timestamps: bool,
    attributes: BTreeMap<String, AttributeType>,
}

impl TableSchema {
    /// Start a schema for `name` keyed by the string attribute `hash_key`.
    pub fn new(name: impl Into<String>, hash_key: impl Into<String>) -> Self {
        let hash_key = hash_key.into();
        let mut attributes = BTreeMap::new();
        attributes.insert(hash_key.clone(), AttributeType::String);
        Self {
            name: name.into(),
            hash_key,
            range_key: None,
            timestamps: false,
            attributes,
        }
    }

    pub fn range_key(mut self, range_key: impl Into<String>) -> Self {
        let range_key = range_key.into();
        self.attributes
            .insert(range_key.clone(), AttributeType::String);
        self.range_key = Some(range_key);
        self
    }

    /// Have the store stamp `createdAt` / `updatedAt`.
    pub fn timestamps(mut self) -> Self {
        self.timestamps = true;
        self.attributes.insert(CREATED_AT.into(), AttributeType::Number);
        self.attributes.insert(UPDATED_AT.into(), AttributeType::Number);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    /// A new table sharing this schema's attributes under different keys.
    pub fn derive(
        &self,
        name: impl Into<String>,
        hash_key: impl Into<String>,
        range_key: Option<&str>,
    ) -> Self {
        let mut derived = Self::new(name, hash_key);
        for (attr, ty) in &self.attributes {
            derived.attributes.entry(attr.clone()).or_insert(*ty);
        }
        if let Some(range_key) = range_key {
            derived = derived.range_key(range_key);
        }
        derived.timestamps = self.timestamps;
        derived
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash_key_name(&self) -> &str {
        &self.hash_key
    }

    pub fn range_key_name(&self) -> Option<&str> {
        self.range_key.as_deref()
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes.get(name).copied()
    }

    /// Names of every declared attribute, in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Extract the physical key of an item, rejecting missing or malformed parts.
    pub fn key_of(&self, item: &Record) -> StoreResult<ItemKey> {
        let hash = self.key_part(item, &self.hash_key)?;
        let range = match &self.range_key {
            Some(range_key) => Some(self.key_part(item, range_key)?),
            None => None,
        };
        Ok(ItemKey { hash, range })
    }

    fn key_part(&self, item: &Record, field: &str) -> StoreResult<String> {
        let value = match item.get(field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(StoreError::validation(
                    &self.name,
                    format!("missing key attribute `{field}`"),
                ));
            }
            Some(other) => {
                return Err(StoreError::validation(
                    &self.name,
                    format!("key attribute `{field}` must be a string, got {other}"),
                ));
            }
        };
        if value.contains('\0') {
            return Err(StoreError::validation(
                &self.name,
                format!("key attribute `{field}` must not contain null bytes"),
            ));
        }
        Ok(value)
    }

    /// Check every attribute of `item` against its declared type.
    ///
    /// Undeclared attributes are rejected. Absent attributes are fine; the
    /// key is checked separately by [`TableSchema::key_of`].
    pub fn validate(&self, item: &Record) -> StoreResult<()> {
        for (name, value) in item {
            let Some(ty) = self.attributes.get(name) else {
                return Err(StoreError::validation(
                    &self.name,
                    format!("attribute `{name}` is not allowed"),
                ));
            };
            if !ty.accepts(value) {
                return Err(StoreError::validation(
                    &self.name,
                    format!("attribute `{name}` must be of type {ty:?}"),
                ));
            }
        }
        Ok(())
    }

    /// Canonicalize values in place: string sets lose duplicates.
    pub fn normalize(&self, item: &mut Record) {
        for (name, value) in item.iter_mut() {
            if self.attributes.get(name) != Some(&AttributeType::StringSet) {
                continue;
            }
            if let Value::Array(items) = value {
                let unique: BTreeSet<String> = items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                *items = unique.into_iter().map(Value::String).collect();
            }
        }
    }
}
