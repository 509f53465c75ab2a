//! RedbBackend: redb-backed persistence for the warehouse tables.
//!
//! Every warehouse table maps to one redb table with `&str` keys
//! (`"{hash}\0{range}"`) and `&[u8]` values (JSON-serialized records).
//! A catalog table tracks which warehouse tables have been created so that
//! writes against an undefined table fail instead of silently creating it.
//! Batches run inside a single write transaction.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use tracing::debug;

use crate::backend::{
    Backend, QueryPage, QueryRequest, TableOptions, WriteRequest, apply_projection, merge_update,
    range_of, strip_nulls,
};
use crate::error::{StoreError, StoreResult};
use crate::record::{ItemKey, Record};
use crate::schema::TableSchema;

/// Created warehouse tables, keyed by table name, valued by their options.
const CATALOG: TableDefinition<&str, &[u8]> = TableDefinition::new("__warehouse_catalog");

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

fn definition(schema: &TableSchema) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(schema.name())
}

fn encode(item: &Record) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(item).map_err(map_err!(Serialize))
}

fn decode(bytes: &[u8]) -> StoreResult<Record> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Thread-safe backend over a single redb database.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open (or create) a persistent database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let backend = Self { db: Arc::new(db) };
        backend.ensure_catalog()?;
        debug!(?path, "redb backend opened");
        Ok(backend)
    }

    /// Create an ephemeral in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(map_err!(Open))?;
        let backend = Self { db: Arc::new(db) };
        backend.ensure_catalog()?;
        debug!("in-memory redb backend opened");
        Ok(backend)
    }

    fn ensure_catalog(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CATALOG).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn exists_in(txn: &WriteTransaction, table: &str) -> StoreResult<bool> {
        let catalog = txn.open_table(CATALOG).map_err(map_err!(Table))?;
        Ok(catalog.get(table).map_err(map_err!(Read))?.is_some())
    }

    fn require_in(txn: &WriteTransaction, table: &str) -> StoreResult<()> {
        if Self::exists_in(txn, table)? {
            Ok(())
        } else {
            Err(StoreError::TableNotFound(table.to_string()))
        }
    }

    fn apply(txn: &WriteTransaction, write: WriteRequest) -> StoreResult<Option<Record>> {
        match write {
            WriteRequest::Put { schema, item } => {
                let key = schema.key_of(&item)?.storage_key();
                let item = strip_nulls(item);
                let value = encode(&item)?;
                let mut table = txn.open_table(definition(&schema)).map_err(map_err!(Table))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                Ok(Some(item))
            }
            WriteRequest::Update {
                schema,
                key,
                set,
                set_if_absent,
            } => {
                let key = key.storage_key();
                let mut table = txn.open_table(definition(&schema)).map_err(map_err!(Table))?;
                let existing = match table.get(key.as_str()).map_err(map_err!(Read))? {
                    Some(guard) => Some(decode(guard.value())?),
                    None => None,
                };
                let item = merge_update(existing, set, set_if_absent);
                let value = encode(&item)?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                Ok(Some(item))
            }
            WriteRequest::Delete { schema, key } => {
                let mut table = txn.open_table(definition(&schema)).map_err(map_err!(Table))?;
                table
                    .remove(key.storage_key().as_str())
                    .map_err(map_err!(Write))?;
                Ok(None)
            }
        }
    }

    /// Run `writes` in one write transaction, committing only if all succeed.
    fn write_all(&self, writes: Vec<WriteRequest>) -> StoreResult<Vec<Option<Record>>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for write in &writes {
            Self::require_in(&txn, write.table())?;
        }
        let results = writes
            .into_iter()
            .map(|write| Self::apply(&txn, write))
            .collect::<StoreResult<Vec<_>>>()?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(results)
    }

    fn write_one(&self, write: WriteRequest) -> StoreResult<Option<Record>> {
        Ok(self.write_all(vec![write])?.pop().flatten())
    }

    /// Whether `table` exists in the catalog.
    fn exists(&self, table: &str) -> StoreResult<bool> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let catalog = txn.open_table(CATALOG).map_err(map_err!(Table))?;
        Ok(catalog.get(table).map_err(map_err!(Read))?.is_some())
    }
}

#[async_trait]
impl Backend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn atomic_batches(&self) -> bool {
        true
    }

    async fn create_table(&self, schema: &TableSchema, options: &TableOptions) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut catalog = txn.open_table(CATALOG).map_err(map_err!(Table))?;
            if catalog.get(schema.name()).map_err(map_err!(Read))?.is_none() {
                let value = serde_json::to_vec(options).map_err(map_err!(Serialize))?;
                catalog
                    .insert(schema.name(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            txn.open_table(definition(schema)).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    async fn delete_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut catalog = txn.open_table(CATALOG).map_err(map_err!(Table))?;
            catalog.remove(schema.name()).map_err(map_err!(Write))?;
        }
        txn.delete_table(definition(schema)).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    async fn get_item(&self, schema: &TableSchema, key: &ItemKey) -> StoreResult<Option<Record>> {
        if !self.exists(schema.name())? {
            return Err(StoreError::TableNotFound(schema.name().to_string()));
        }
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(definition(schema)).map_err(map_err!(Table))?;
        match table.get(key.storage_key().as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn put_item(&self, schema: &TableSchema, item: Record) -> StoreResult<Record> {
        let key = schema.key_of(&item)?;
        let stored = self.write_one(WriteRequest::Put {
            schema: Arc::new(schema.clone()),
            item,
        })?;
        debug!(table = schema.name(), %key, "item stored");
        Ok(stored.unwrap_or_default())
    }

    async fn update_item(
        &self,
        schema: &TableSchema,
        key: &ItemKey,
        set: Record,
        set_if_absent: Record,
    ) -> StoreResult<Record> {
        let stored = self.write_one(WriteRequest::Update {
            schema: Arc::new(schema.clone()),
            key: key.clone(),
            set,
            set_if_absent,
        })?;
        debug!(table = schema.name(), %key, "item merged");
        Ok(stored.unwrap_or_default())
    }

    async fn delete_item(&self, schema: &TableSchema, key: &ItemKey) -> StoreResult<()> {
        self.write_one(WriteRequest::Delete {
            schema: Arc::new(schema.clone()),
            key: key.clone(),
        })?;
        Ok(())
    }

    async fn query(&self, schema: &TableSchema, request: &QueryRequest) -> StoreResult<QueryPage> {
        if !self.exists(schema.name())? {
            return Err(StoreError::TableNotFound(schema.name().to_string()));
        }
        let start = match &request.exclusive_start {
            Some(range) => {
                ItemKey::with_range(request.hash.as_str(), range.as_str()).storage_key()
            }
            None => ItemKey::partition_start(&request.hash),
        };
        let end = ItemKey::partition_end(&request.hash);
        let lower = if request.exclusive_start.is_some() {
            Bound::Excluded(start.as_str())
        } else {
            Bound::Included(start.as_str())
        };

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(definition(schema)).map_err(map_err!(Table))?;
        let mut entries = table
            .range::<&str>((lower, Bound::Excluded(end.as_str())))
            .map_err(map_err!(Read))?;

        let mut page = QueryPage::default();
        let mut last = None;
        while page.items.len() < request.limit {
            let Some(entry) = entries.next() else {
                break;
            };
            let (_, value) = entry.map_err(map_err!(Read))?;
            let item = decode(value.value())?;
            last = range_of(schema, &item);
            page.items
                .push(apply_projection(item, request.attributes.as_deref()));
        }
        if entries.next().is_some() {
            page.last_evaluated = last;
        }
        Ok(page)
    }

    async fn batch_write(&self, writes: Vec<WriteRequest>) -> StoreResult<Vec<Option<Record>>> {
        let count = writes.len();
        let results = self.write_all(writes)?;
        debug!(count, "batch committed");
        Ok(results)
    }
}
