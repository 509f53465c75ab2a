//! Dependent: the set of packages depending on a package.

use warehouse_store::{AttributeType, TableSchema};

use crate::keys::KeyDeriver;

pub const TABLE: &str = "WarehouseDependent";

pub const KEYS: KeyDeriver = KeyDeriver::natural("name");

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, "name").attribute("dependents", AttributeType::StringSet)
}
