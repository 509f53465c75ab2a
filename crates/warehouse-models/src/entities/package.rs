//! Package: registry metadata of the latest version of a package.
//!
//! Every write is mirrored into [`package_cache`](super::package_cache) in
//! the same backend batch. [`Package`] therefore exposes no unmirrored
//! write path. Point and buffered reads hand back records with `config`
//! values decoded (see [`deserialize_record`]); [`Package::find_all_stream`]
//! does not.

use serde_json::Value;
use tracing::warn;
use warehouse_store::{
    AttributeType, Record, StoreResult, TableOptions, TableSchema, WriteRequest,
};

use super::package_cache;
use crate::compat::{CompatModel, FindQuery, RecordStream};
use crate::error::ModelResult;
use crate::keys::KeyDeriver;

pub const TABLE: &str = "WarehousePackage";

pub const KEYS: KeyDeriver = KeyDeriver::natural("name");

/// Version-level keys never copied out of a publish payload.
const RESTRICTED: [&str; 3] = ["readme", "dist", "readmeFilename"];

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE, "name")
        .attribute("version", AttributeType::String)
        .attribute("description", AttributeType::String)
        .attribute("main", AttributeType::String)
        .attribute("gitHead", AttributeType::String)
        .attribute("extended", AttributeType::Json)
        .attribute("keywords", AttributeType::StringSet)
        .attribute("bundledDependencies", AttributeType::StringSet)
        .attribute("distTags", AttributeType::StringMap)
        .attribute("envs", AttributeType::StringMap)
        .attribute("metadata", AttributeType::StringMap)
        .attribute("config", AttributeType::StringMap)
        .attribute("repository", AttributeType::StringMap)
        .attribute("dependencies", AttributeType::StringMap)
        .attribute("devDependencies", AttributeType::StringMap)
        .attribute("peerDependencies", AttributeType::StringMap)
        .attribute("optionalDependencies", AttributeType::StringMap)
}

/// Package adapter with cache mirroring and `config` decoding.
#[derive(Debug, Clone)]
pub struct Package {
    compat: CompatModel,
    cache: CompatModel,
}

impl Package {
    pub fn new(compat: CompatModel, cache: CompatModel) -> Self {
        Self { compat, cache }
    }

    pub fn table_name(&self) -> &str {
        self.compat.table_name()
    }

    /// The PackageCache adapter mirrored by this one.
    pub fn cache(&self) -> &CompatModel {
        &self.cache
    }

    pub async fn create(&self, data: Record) -> ModelResult<Record> {
        let writes = vec![
            self.cache
                .prepare_create(package_cache::cache_entry(&data))?,
            self.compat.prepare_create(data)?,
        ];
        Ok(self.mirror(writes).await?.unwrap_or_default())
    }

    pub async fn update(&self, data: Record) -> ModelResult<Record> {
        let writes = vec![
            self.cache
                .prepare_update(package_cache::cache_entry(&data))?,
            self.compat.prepare_update(data)?,
        ];
        Ok(self.mirror(writes).await?.unwrap_or_default())
    }

    pub async fn remove(&self, data: &Record) -> ModelResult<()> {
        let writes = vec![
            self.cache
                .prepare_remove(&package_cache::cache_entry(data))?,
            self.compat.prepare_remove(data)?,
        ];
        self.mirror(writes).await?;
        Ok(())
    }

    pub async fn get(&self, data: &Record) -> ModelResult<Option<Record>> {
        Ok(self.compat.get(data).await?.map(deserialize_record))
    }

    pub async fn find_one(&self, data: &Record) -> ModelResult<Option<Record>> {
        self.get(data).await
    }

    pub async fn find_all(&self, query: impl Into<FindQuery>) -> ModelResult<Vec<Record>> {
        let items = self.compat.find_all(query).await?;
        Ok(items.into_iter().map(deserialize_record).collect())
    }

    /// Raw records of the partition named by the query, fetched lazily.
    pub fn find_all_stream(&self, query: impl Into<FindQuery>) -> RecordStream {
        self.compat.find_all_stream(query)
    }

    pub async fn ensure_tables(&self, options: &TableOptions) -> StoreResult<()> {
        self.compat.ensure_tables(options).await
    }

    pub async fn drop_tables(&self) -> StoreResult<()> {
        self.compat.drop_tables().await
    }

    /// Submit the cache write and the package write as one batch and return
    /// the package result.
    async fn mirror(&self, writes: Vec<WriteRequest>) -> ModelResult<Option<Record>> {
        let backend = self.compat.model().backend();
        if !backend.atomic_batches() {
            warn!(
                backend = backend.name(),
                "batch writes are not atomic, package cache mirroring is best-effort"
            );
        }
        let mut results = backend.batch_write(writes).await?;
        Ok(results.pop().flatten())
    }
}

/// The version document named by the payload's `latest` dist-tag.
pub fn extract_latest(payload: &Value) -> Record {
    let tags = payload
        .get("distTags")
        .or_else(|| payload.get("dist-tags"));
    let latest = tags.and_then(|t| t.get("latest")).and_then(Value::as_str);
    latest
        .and_then(|v| payload.get("versions").and_then(|versions| versions.get(v)))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Turn an npm publish payload into a record fitting the Package schema.
///
/// Keys the schema does not declare are collected into `extended`.
pub fn from_publish(payload: &Value) -> Record {
    let mut replica: Record = extract_latest(payload)
        .into_iter()
        .filter(|(key, _)| !key.starts_with('_') && !RESTRICTED.contains(&key.as_str()))
        .collect();

    if let Some(Value::Object(config)) = replica.get_mut("config") {
        for value in config.values_mut() {
            if !value.is_string() && !value.is_null() {
                *value = Value::String(value.to_string());
            }
        }
    }

    if let Some(maintainers) = payload.get("maintainers") {
        replica.insert("maintainers".to_string(), maintainers.clone());
    }
    if let Some(tags) = payload.get("dist-tags").or_else(|| payload.get("distTags")) {
        replica.insert("distTags".to_string(), tags.clone());
    }

    let schema = schema();
    let (declared, extended): (Record, Record) = replica
        .into_iter()
        .partition(|(key, _)| schema.attribute_type(key).is_some());
    let mut replica = declared;
    replica.insert("extended".to_string(), Value::Object(extended));
    replica
}

/// Parse the JSON text values of `config` back into JSON.
///
/// Strings that do not parse are kept as-is. `config` is always present on
/// the result.
pub fn deserialize_record(mut record: Record) -> Record {
    let config = match record.remove("config") {
        Some(Value::Object(config)) => config
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) if !text.is_empty() => {
                    let parsed = serde_json::from_str(&text).unwrap_or(Value::String(text));
                    (key, parsed)
                }
                other => (key, other),
            })
            .collect(),
        _ => Record::new(),
    };
    record.insert("config".to_string(), Value::Object(config));
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
