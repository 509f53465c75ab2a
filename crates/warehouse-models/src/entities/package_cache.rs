//! PackageCache: every Package under one constant partition, so the whole
//! set can be listed with a single partition query.

use serde_json::Value;
use warehouse_store::{Record, TableSchema};

use super::package;
use crate::keys::KeyDeriver;

pub const TABLE: &str = "WarehousePackageCache";

/// Hash key value shared by every cache entry.
pub const PARTITIONER: &str = "cached";

pub const KEYS: KeyDeriver = KeyDeriver::natural("partitioner").with_range("name");

pub fn schema() -> TableSchema {
    package::schema().derive(TABLE, "partitioner", Some("name"))
}

/// The cache entry mirroring `pkg`.
pub fn cache_entry(pkg: &Record) -> Record {
    let mut entry = pkg.clone();
    entry.insert("partitioner".to_string(), Value::from(PARTITIONER));
    entry
}

/// Conditions listing every cache entry.
pub fn all() -> Record {
    let mut conditions = Record::new();
    conditions.insert("partitioner".to_string(), Value::from(PARTITIONER));
    conditions
}
