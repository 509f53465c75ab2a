//! ReleaseLine: one `(pkg, version)` in a package's release history.

use warehouse_store::{AttributeType, TableSchema};

use crate::keys::{KEY_FIELD, KeyDeriver};

pub const TABLE: &str = "WarehouseReleaseLine";

pub const KEYS: KeyDeriver = KeyDeriver::composite(&["pkg", "version"]);

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, KEY_FIELD)
        .attribute("pkg", AttributeType::String)
        .attribute("previous_version", AttributeType::String)
        .attribute("version", AttributeType::String)
}
