//! BuildHead: the current build (HEAD) of an `(env, name, locale)`.

use std::ops::Deref;

use warehouse_store::{AttributeType, Record, TableSchema};

use crate::compat::CompatModel;
use crate::error::ModelResult;
use crate::files;
use crate::keys::{KEY_FIELD, KeyDeriver};

pub const TABLE: &str = "WarehouseBuildHead";

pub const KEYS: KeyDeriver = KeyDeriver::composite(&["env", "name"]).with_range("locale");

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, KEY_FIELD)
        .range_key("locale")
        .timestamps()
        .attribute("env", AttributeType::String)
        .attribute("name", AttributeType::String)
        .attribute("buildId", AttributeType::String)
        .attribute("previousBuildId", AttributeType::String)
        .attribute("rollbackBuildIds", AttributeType::Json)
        .attribute("version", AttributeType::String)
        // Base URL of the CDN serving every artifact.
        .attribute("cdnUrl", AttributeType::String)
        .attribute("fingerprints", AttributeType::StringSet)
        .attribute("artifacts", AttributeType::StringSet)
        .attribute("recommended", AttributeType::StringSet)
}

/// BuildHead adapter with file-list resolution.
#[derive(Debug, Clone)]
pub struct BuildHead {
    compat: CompatModel,
    build_files: CompatModel,
}

impl BuildHead {
    pub fn new(compat: CompatModel, build_files: CompatModel) -> Self {
        Self {
            compat,
            build_files,
        }
    }

    /// Resolve the files of `head` (a stored BuildHead record).
    pub async fn fetch_files(&self, head: &Record) -> ModelResult<Vec<Record>> {
        files::fetch_files(&self.build_files, head).await
    }
}

impl Deref for BuildHead {
    type Target = CompatModel;

    fn deref(&self) -> &CompatModel {
        &self.compat
    }
}
