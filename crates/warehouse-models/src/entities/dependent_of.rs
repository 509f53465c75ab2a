//! DependentOf: reverse lookup from a package to the package it depends on.

use warehouse_store::{AttributeType, TableSchema};

use crate::keys::KeyDeriver;

pub const TABLE: &str = "WarehouseDependentOf";

pub const KEYS: KeyDeriver = KeyDeriver::natural("pkg");

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, "pkg").attribute("dependent_of", AttributeType::String)
}
