//! Model: a defined table bound to a backend.
//!
//! A `Model` is what the compatibility layer wraps: the schema-enforcing,
//! timestamp-stamping handle of one table. Every primitive validates the
//! item against the [`TableSchema`] before the backend sees it.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::backend::{Backend, QueryPage, QueryRequest, TableOptions, WriteRequest};
use crate::error::StoreResult;
use crate::record::{Record, now_millis};
use crate::schema::{CREATED_AT, TableSchema, UPDATED_AT};

/// Handle to one table on one backend. Cheap to clone.
#[derive(Clone)]
pub struct Model {
    backend: Arc<dyn Backend>,
    schema: Arc<TableSchema>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("backend", &self.backend.name())
            .field("table", &self.schema.name())
            .finish()
    }
}

impl Model {
    /// Define a table on `backend`. Does not create it; see [`Model::create_table`].
    pub fn define(backend: Arc<dyn Backend>, schema: TableSchema) -> Self {
        Self {
            backend,
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn table_name(&self) -> &str {
        self.schema.name()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    // ── Table lifecycle ────────────────────────────────────────────

    pub async fn create_table(&self, options: &TableOptions) -> StoreResult<()> {
        self.backend.create_table(&self.schema, options).await?;
        debug!(table = self.table_name(), ?options, "table ensured");
        Ok(())
    }

    pub async fn delete_table(&self) -> StoreResult<()> {
        self.backend.delete_table(&self.schema).await?;
        debug!(table = self.table_name(), "table dropped");
        Ok(())
    }

    // ── Prepared writes ────────────────────────────────────────────

    /// Validate a whole item for insertion without writing it.
    pub fn prepare_create(&self, mut item: Record) -> StoreResult<WriteRequest> {
        self.schema.key_of(&item)?;
        self.schema.validate(&item)?;
        self.schema.normalize(&mut item);
        if self.schema.has_timestamps() {
            let now = Value::from(now_millis());
            item.entry(CREATED_AT).or_insert_with(|| now.clone());
            item.insert(UPDATED_AT.to_string(), now);
        }
        Ok(WriteRequest::Put {
            schema: Arc::clone(&self.schema),
            item,
        })
    }

    /// Validate a partial item for a merge without writing it.
    pub fn prepare_update(&self, mut set: Record) -> StoreResult<WriteRequest> {
        let key = self.schema.key_of(&set)?;
        self.schema.validate(&set)?;
        self.schema.normalize(&mut set);
        let mut set_if_absent = Record::new();
        if self.schema.has_timestamps() {
            let now = Value::from(now_millis());
            set_if_absent.insert(CREATED_AT.to_string(), now.clone());
            set.insert(UPDATED_AT.to_string(), now);
        }
        Ok(WriteRequest::Update {
            schema: Arc::clone(&self.schema),
            key,
            set,
            set_if_absent,
        })
    }

    /// Build a delete for the item identified by the key attributes of `data`.
    pub fn prepare_destroy(&self, data: &Record) -> StoreResult<WriteRequest> {
        let key = self.schema.key_of(data)?;
        Ok(WriteRequest::Delete {
            schema: Arc::clone(&self.schema),
            key,
        })
    }

    // ── Item primitives ────────────────────────────────────────────

    /// Insert or overwrite an item. Returns the stored item.
    pub async fn create(&self, item: Record) -> StoreResult<Record> {
        let request = self.prepare_create(item)?;
        Ok(self.execute(request).await?.unwrap_or_default())
    }

    /// Merge attributes into an item, creating it if absent. Returns the stored item.
    pub async fn update(&self, set: Record) -> StoreResult<Record> {
        let request = self.prepare_update(set)?;
        Ok(self.execute(request).await?.unwrap_or_default())
    }

    pub async fn destroy(&self, data: &Record) -> StoreResult<()> {
        let request = self.prepare_destroy(data)?;
        self.execute(request).await?;
        Ok(())
    }

    /// Point-read by the key attributes of `data`.
    pub async fn get(&self, data: &Record) -> StoreResult<Option<Record>> {
        let key = self.schema.key_of(data)?;
        self.backend.get_item(&self.schema, &key).await
    }

    /// Read one page of the partition `request.hash`.
    pub async fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        self.backend.query(&self.schema, request).await
    }

    /// Apply a single prepared write.
    pub async fn execute(&self, request: WriteRequest) -> StoreResult<Option<Record>> {
        let table = request.table().to_string();
        let result = match request {
            WriteRequest::Put { schema, item } => {
                Some(self.backend.put_item(&schema, item).await?)
            }
            WriteRequest::Update {
                schema,
                key,
                set,
                set_if_absent,
            } => Some(
                self.backend
                    .update_item(&schema, &key, set, set_if_absent)
                    .await?,
            ),
            WriteRequest::Delete { schema, key } => {
                self.backend.delete_item(&schema, &key).await?;
                debug!(%table, %key, "item deleted");
                None
            }
        };
        Ok(result)
    }
}
