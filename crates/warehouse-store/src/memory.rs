//! In-memory backend for tests and ephemeral registries.
//!
//! Each table is a `BTreeMap` from storage key (`"{hash}\0{range}"`) to
//! item, so a partition is one contiguous key range. Batches are applied
//! under a single write lock, which makes them atomic.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{
    Backend, QueryPage, QueryRequest, TableOptions, WriteRequest, apply_projection, merge_update,
    range_of, strip_nulls,
};
use crate::error::{StoreError, StoreResult};
use crate::record::{ItemKey, Record};
use crate::schema::TableSchema;

type Table = BTreeMap<String, Record>;

/// Ephemeral backend holding every table in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the tables that currently exist.
    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().map_err(lock_err)?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Internal(e.to_string())
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    schema: &TableSchema,
) -> StoreResult<&'a mut Table> {
    tables
        .get_mut(schema.name())
        .ok_or_else(|| StoreError::TableNotFound(schema.name().to_string()))
}

fn apply(tables: &mut HashMap<String, Table>, write: WriteRequest) -> StoreResult<Option<Record>> {
    match write {
        WriteRequest::Put { schema, item } => {
            let key = schema.key_of(&item)?;
            let item = strip_nulls(item);
            table_mut(tables, &schema)?.insert(key.storage_key(), item.clone());
            Ok(Some(item))
        }
        WriteRequest::Update {
            schema,
            key,
            set,
            set_if_absent,
        } => {
            let table = table_mut(tables, &schema)?;
            let storage_key = key.storage_key();
            let existing = table.remove(&storage_key);
            let item = merge_update(existing, set, set_if_absent);
            table.insert(storage_key, item.clone());
            Ok(Some(item))
        }
        WriteRequest::Delete { schema, key } => {
            table_mut(tables, &schema)?.remove(&key.storage_key());
            Ok(None)
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn atomic_batches(&self) -> bool {
        true
    }

    async fn create_table(&self, schema: &TableSchema, _options: &TableOptions) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(lock_err)?;
        tables.entry(schema.name().to_string()).or_default();
        Ok(())
    }

    async fn delete_table(&self, schema: &TableSchema) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(lock_err)?;
        tables.remove(schema.name());
        Ok(())
    }

    async fn get_item(&self, schema: &TableSchema, key: &ItemKey) -> StoreResult<Option<Record>> {
        let tables = self.tables.read().map_err(lock_err)?;
        let table = tables
            .get(schema.name())
            .ok_or_else(|| StoreError::TableNotFound(schema.name().to_string()))?;
        Ok(table.get(&key.storage_key()).cloned())
    }

    async fn put_item(&self, schema: &TableSchema, item: Record) -> StoreResult<Record> {
        let key = schema.key_of(&item)?;
        let item = strip_nulls(item);
        let mut tables = self.tables.write().map_err(lock_err)?;
        table_mut(&mut tables, schema)?.insert(key.storage_key(), item.clone());
        debug!(table = schema.name(), %key, "item stored");
        Ok(item)
    }

    async fn update_item(
        &self,
        schema: &TableSchema,
        key: &ItemKey,
        set: Record,
        set_if_absent: Record,
    ) -> StoreResult<Record> {
        let mut tables = self.tables.write().map_err(lock_err)?;
        let table = table_mut(&mut tables, schema)?;
        let storage_key = key.storage_key();
        let existing = table.remove(&storage_key);
        let item = merge_update(existing, set, set_if_absent);
        table.insert(storage_key, item.clone());
        debug!(table = schema.name(), %key, "item merged");
        Ok(item)
    }

    async fn delete_item(&self, schema: &TableSchema, key: &ItemKey) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(lock_err)?;
        table_mut(&mut tables, schema)?.remove(&key.storage_key());
        Ok(())
    }

    async fn query(&self, schema: &TableSchema, request: &QueryRequest) -> StoreResult<QueryPage> {
        let tables = self.tables.read().map_err(lock_err)?;
        let table = tables
            .get(schema.name())
            .ok_or_else(|| StoreError::TableNotFound(schema.name().to_string()))?;

        let start = match &request.exclusive_start {
            Some(range) => {
                Bound::Excluded(ItemKey::with_range(request.hash.as_str(), range.as_str()).storage_key())
            }
            None => Bound::Included(ItemKey::partition_start(&request.hash)),
        };
        let end = Bound::Excluded(ItemKey::partition_end(&request.hash));

        let mut matched = table.range::<String, _>((start, end)).map(|(_, item)| item);
        let mut page = QueryPage::default();
        let mut last = None;
        for item in matched.by_ref().take(request.limit) {
            last = range_of(schema, item);
            page.items
                .push(apply_projection(item.clone(), request.attributes.as_deref()));
        }
        if matched.next().is_some() {
            page.last_evaluated = last;
        }
        Ok(page)
    }

    async fn batch_write(&self, writes: Vec<WriteRequest>) -> StoreResult<Vec<Option<Record>>> {
        let mut tables = self.tables.write().map_err(lock_err)?;
        // Reject the whole batch before touching anything.
        for write in &writes {
            if !tables.contains_key(write.table()) {
                return Err(StoreError::TableNotFound(write.table().to_string()));
            }
            if let WriteRequest::Put { schema, item } = write {
                schema.key_of(item)?;
            }
        }
        let count = writes.len();
        let results = writes
            .into_iter()
            .map(|write| apply(&mut tables, write))
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(count, "batch applied");
        Ok(results)
    }
}
