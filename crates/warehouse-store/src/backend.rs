//! The backend capability set every physical store implements.
//!
//! A [`Backend`] persists items of tables described by a [`TableSchema`].
//! It performs no schema enforcement of its own; [`Model`](crate::Model)
//! validates and stamps items before handing them over.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;
use crate::record::{ItemKey, Record, project};
use crate::schema::TableSchema;

/// Store-specific options forwarded on table creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Provisioned read throughput, for stores that take one.
    pub read_capacity: Option<u64>,
    /// Provisioned write throughput, for stores that take one.
    pub write_capacity: Option<u64>,
}

/// One page of a partition query.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Hash key of the partition to read.
    pub hash: String,
    /// Attribute projection; `None` returns whole items.
    pub attributes: Option<Vec<String>>,
    /// Resume after this range key (exclusive).
    pub exclusive_start: Option<String>,
    /// Maximum items in the page.
    pub limit: usize,
}

/// Result page of a partition query.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub items: Vec<Record>,
    /// Range key of the last item returned when more items remain.
    pub last_evaluated: Option<String>,
}

/// A validated write, ready to be applied alone or as part of a batch.
#[derive(Debug, Clone)]
pub enum WriteRequest {
    /// Insert or overwrite a whole item.
    Put {
        schema: Arc<TableSchema>,
        item: Record,
    },
    /// Merge attributes into an item, creating it if absent.
    ///
    /// A `null` in `set` removes the attribute. `set_if_absent` only applies
    /// when the item did not exist before.
    Update {
        schema: Arc<TableSchema>,
        key: ItemKey,
        set: Record,
        set_if_absent: Record,
    },
    /// Delete an item; a missing item is not an error.
    Delete {
        schema: Arc<TableSchema>,
        key: ItemKey,
    },
}

impl WriteRequest {
    pub fn schema(&self) -> &TableSchema {
        match self {
            Self::Put { schema, .. } | Self::Update { schema, .. } | Self::Delete { schema, .. } => {
                schema
            }
        }
    }

    pub fn table(&self) -> &str {
        self.schema().name()
    }
}

/// Physical store primitives.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Whether [`Backend::batch_write`] applies all writes or none.
    fn atomic_batches(&self) -> bool {
        false
    }

    /// Create a table; creating an existing table is a no-op.
    async fn create_table(&self, schema: &TableSchema, options: &TableOptions) -> StoreResult<()>;

    /// Drop a table and its items; dropping a missing table is a no-op.
    async fn delete_table(&self, schema: &TableSchema) -> StoreResult<()>;

    async fn get_item(&self, schema: &TableSchema, key: &ItemKey) -> StoreResult<Option<Record>>;

    async fn put_item(&self, schema: &TableSchema, item: Record) -> StoreResult<Record>;

    async fn update_item(
        &self,
        schema: &TableSchema,
        key: &ItemKey,
        set: Record,
        set_if_absent: Record,
    ) -> StoreResult<Record>;

    async fn delete_item(&self, schema: &TableSchema, key: &ItemKey) -> StoreResult<()>;

    /// Read one page of a partition in range-key order.
    async fn query(&self, schema: &TableSchema, request: &QueryRequest) -> StoreResult<QueryPage>;

    /// Apply several writes. Results line up with `writes`; deletes yield `None`.
    ///
    /// The default applies writes one after another with no rollback.
    async fn batch_write(&self, writes: Vec<WriteRequest>) -> StoreResult<Vec<Option<Record>>> {
        let mut results = Vec::with_capacity(writes.len());
        for write in writes {
            let result = match write {
                WriteRequest::Put { schema, item } => Some(self.put_item(&schema, item).await?),
                WriteRequest::Update {
                    schema,
                    key,
                    set,
                    set_if_absent,
                } => Some(self.update_item(&schema, &key, set, set_if_absent).await?),
                WriteRequest::Delete { schema, key } => {
                    self.delete_item(&schema, &key).await?;
                    None
                }
            };
            results.push(result);
        }
        Ok(results)
    }
}

/// Merge an update into the previous version of an item.
pub(crate) fn merge_update(existing: Option<Record>, set: Record, set_if_absent: Record) -> Record {
    let mut item = match existing {
        Some(item) => item,
        None => set_if_absent,
    };
    for (name, value) in set {
        if value.is_null() {
            item.remove(&name);
        } else {
            item.insert(name, value);
        }
    }
    item
}

/// Drop `null` attributes; they mean "absent" in a stored item.
pub(crate) fn strip_nulls(mut item: Record) -> Record {
    item.retain(|_, value| !value.is_null());
    item
}

/// Apply the page projection, if any.
pub(crate) fn apply_projection(item: Record, attributes: Option<&[String]>) -> Record {
    match attributes {
        Some(fields) => project(item, fields),
        None => item,
    }
}

/// Range key of a stored item, used as the page cursor.
pub(crate) fn range_of(schema: &TableSchema, item: &Record) -> Option<String> {
    let range_key = schema.range_key_name()?;
    item.get(range_key).and_then(Value::as_str).map(str::to_string)
}
