//! ReleaseLineDep: a dependent package pinned within a release line.

use warehouse_store::{AttributeType, TableSchema};

use crate::keys::{KEY_FIELD, KeyDeriver};

pub const TABLE: &str = "WarehouseReleaseLineDep";

pub const KEYS: KeyDeriver = KeyDeriver::composite(&["pkg", "version"]).with_range("dependent");

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, KEY_FIELD)
        .range_key("dependent")
        .attribute("pkg", AttributeType::String)
        .attribute("previous_version", AttributeType::String)
        .attribute("version", AttributeType::String)
        .attribute("dependent_version", AttributeType::String)
}
