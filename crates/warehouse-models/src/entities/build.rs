//! Build: metadata of one built `(env, name, version, locale)`.

use std::ops::Deref;

use warehouse_store::{AttributeType, Record, TableSchema};

use crate::compat::CompatModel;
use crate::error::ModelResult;
use crate::files;
use crate::keys::{KEY_FIELD, KeyDeriver};

pub const TABLE: &str = "WarehouseBuild";

pub const KEYS: KeyDeriver = KeyDeriver::composite(&["env", "name", "version"]).with_range("locale");

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, KEY_FIELD)
        .range_key("locale")
        .timestamps()
        .attribute("build_id", AttributeType::String)
        .attribute("previous_build_id", AttributeType::String)
        .attribute("rollback_build_ids", AttributeType::Json)
        .attribute("env", AttributeType::String)
        .attribute("name", AttributeType::String)
        .attribute("version", AttributeType::String)
        .attribute("cdn_url", AttributeType::String)
        // e.g. [sdf34u93fjk34j, lhe439843kjdsf]
        .attribute("fingerprints", AttributeType::StringSet)
        // e.g. [sdf34u93fjk34j/app.min.js, lhe439843kjdsf/app.js]
        .attribute("artifacts", AttributeType::StringSet)
        .attribute("recommended", AttributeType::StringSet)
}

/// Build adapter with file-list resolution.
#[derive(Debug, Clone)]
pub struct Build {
    compat: CompatModel,
    build_files: CompatModel,
}

impl Build {
    pub fn new(compat: CompatModel, build_files: CompatModel) -> Self {
        Self {
            compat,
            build_files,
        }
    }

    /// Resolve the files of `build` (a stored Build record).
    pub async fn fetch_files(&self, build: &Record) -> ModelResult<Vec<Record>> {
        files::fetch_files(&self.build_files, build).await
    }
}

impl Deref for Build {
    type Target = CompatModel;

    fn deref(&self) -> &CompatModel {
        &self.compat
    }
}
