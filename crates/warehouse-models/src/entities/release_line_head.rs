//! ReleaseLineHead: the latest release line of a package.

use warehouse_store::{AttributeType, TableSchema};

use crate::keys::KeyDeriver;

pub const TABLE: &str = "WarehouseReleaseLineHead";

pub const KEYS: KeyDeriver = KeyDeriver::natural("pkg");

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, "pkg")
        .attribute("previous_version", AttributeType::String)
        .attribute("version", AttributeType::String)
}
