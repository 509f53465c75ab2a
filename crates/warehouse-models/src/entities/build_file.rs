//! BuildFile: one file produced by a build, keyed by fingerprint.

use serde_json::Value;
use warehouse_store::{AttributeType, Record, TableSchema, decode_blob};

use crate::keys::KeyDeriver;

pub const TABLE: &str = "WarehouseBuildFile";

pub const KEYS: KeyDeriver = KeyDeriver::natural("fingerprint");

/// Blob attributes holding file contents.
pub const BLOB_FIELDS: [&str; 2] = ["source", "sourcemap"];

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, "fingerprint")
        .timestamps()
        .attribute("build_id", AttributeType::String)
        .attribute("url", AttributeType::String)
        .attribute("env", AttributeType::String)
        .attribute("locale", AttributeType::String)
        .attribute("name", AttributeType::String)
        .attribute("version", AttributeType::String)
        .attribute("extension", AttributeType::String)
        .attribute("filename", AttributeType::String)
        .attribute("source", AttributeType::Blob)
        .attribute("sourcemap", AttributeType::Blob)
        .attribute("shrinkwrap", AttributeType::Json)
}

/// Decode the blob attributes of a single record into UTF-8 text.
///
/// Values that are not valid base64 are left untouched; bytes that are not
/// valid UTF-8 are decoded lossily.
pub fn deserialize_record(mut record: Record) -> Record {
    for field in BLOB_FIELDS {
        let Some(bytes) = record.get(field).and_then(decode_blob) else {
            continue;
        };
        let decoded = String::from_utf8_lossy(&bytes).into_owned();
        record.insert(field.to_string(), Value::String(decoded));
    }
    record
}

/// [`deserialize_record`] over either one record or an array of records,
/// preserving the input shape.
pub fn deserialize(value: Value) -> Value {
    match value {
        Value::Object(record) => Value::Object(deserialize_record(record)),
        Value::Array(items) => Value::Array(items.into_iter().map(deserialize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warehouse_store::blob;

    #[test]
    fn decodes_single_record() {
        let src = "module.exports = function (options, callback) {}";
        let map = "function foo() { var bar = false; return bar; }";
        let value = json!({
            "source": blob(src.as_bytes()),
            "sourcemap": blob(map.as_bytes()),
        });

        let out = deserialize(value);
        assert_eq!(out, json!({ "source": src, "sourcemap": map }));
    }

    #[test]
    fn decodes_array_and_keeps_shape() {
        let src = "function() { return what }";
        let out = deserialize(json!([{ "source": blob(src.as_bytes()) }]));
        assert_eq!(out, json!([{ "source": src }]));
    }

    #[test]
    fn leaves_missing_and_null_fields() {
        let out = deserialize(json!({ "fingerprint": "abc", "sourcemap": null }));
        assert_eq!(out, json!({ "fingerprint": "abc", "sourcemap": null }));
    }
}
