//! Compatibility adapter over a single-hash-key/range-key store.
//!
//! [`CompatModel`] lets table-oriented CRUD and partition-query code run
//! against a [`Model`] whose identity is one physical hash key plus an
//! optional range key. It synthesizes composite keys, forwards attribute
//! projections, and turns the page-at-a-time query primitive into either a
//! buffered `Vec` or a lazy stream.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::debug;
use warehouse_store::{
    Model, QueryRequest, Record, StoreError, StoreResult, TableOptions, WriteRequest,
};

use crate::keys::{KEY_FIELD, KeyDeriver};

/// Items requested per backend page by default.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Lazy, finite, non-restartable sequence of records.
pub type RecordStream = BoxStream<'static, StoreResult<Record>>;

/// Input of [`CompatModel::find_all`].
///
/// Built from either plain identifying conditions or a structured object
/// `{ "conditions": {...}, "fields": [...] }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub conditions: Record,
    pub fields: Option<Vec<String>>,
}

impl FindQuery {
    pub fn new(conditions: Record) -> Self {
        Self {
            conditions,
            fields: None,
        }
    }

    /// Restrict results to the named attributes.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

impl From<Record> for FindQuery {
    fn from(mut data: Record) -> Self {
        let Some(Value::Object(conditions)) = data.remove("conditions") else {
            return Self::new(data);
        };
        let fields = data.get("fields").and_then(Value::as_array).map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.as_str().map(str::to_string))
                .collect()
        });
        Self { conditions, fields }
    }
}

/// Uniform CRUD + query contract over one table.
#[derive(Debug, Clone)]
pub struct CompatModel {
    model: Model,
    keys: KeyDeriver,
    page_size: usize,
}

impl CompatModel {
    pub fn new(model: Model, keys: KeyDeriver) -> Self {
        Self {
            model,
            keys,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the backend page size used by [`CompatModel::find_all`].
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn keys(&self) -> &KeyDeriver {
        &self.keys
    }

    pub fn table_name(&self) -> &str {
        self.model.table_name()
    }

    /// Merge the derived key into `data`.
    ///
    /// A composite `key` is always recomputed; every other attribute the
    /// caller supplied wins over its derived counterpart.
    fn with_key(&self, mut data: Record) -> Record {
        let derived = self.keys.derive(&data);
        if self.keys.is_composite() {
            if let Some(hash) = derived.hash {
                data.insert(KEY_FIELD.to_string(), hash);
            }
        }
        data
    }

    /// Only the key attributes of `data`.
    fn key_only(&self, data: &Record) -> Record {
        self.keys.derive(data).into_record()
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Insert (or overwrite) an item. Returns the stored item.
    pub async fn create(&self, data: Record) -> StoreResult<Record> {
        self.model.create(self.with_key(data)).await
    }

    /// Merge attributes into an item. Unrelated attributes are untouched.
    pub async fn update(&self, data: Record) -> StoreResult<Record> {
        self.model.update(self.with_key(data)).await
    }

    /// Delete the item identified by `data`. Missing items are not an error.
    pub async fn remove(&self, data: &Record) -> StoreResult<()> {
        self.model.destroy(&self.key_only(data)).await
    }

    pub fn prepare_create(&self, data: Record) -> StoreResult<WriteRequest> {
        self.model.prepare_create(self.with_key(data))
    }

    pub fn prepare_update(&self, data: Record) -> StoreResult<WriteRequest> {
        self.model.prepare_update(self.with_key(data))
    }

    pub fn prepare_remove(&self, data: &Record) -> StoreResult<WriteRequest> {
        self.model.prepare_destroy(&self.key_only(data))
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Point-read. `Ok(None)` is the "not found" signal.
    pub async fn get(&self, data: &Record) -> StoreResult<Option<Record>> {
        self.model.get(&self.key_only(data)).await
    }

    /// Alias for [`CompatModel::get`].
    pub async fn find_one(&self, data: &Record) -> StoreResult<Option<Record>> {
        self.get(data).await
    }

    /// Every item of the partition named by the query, buffered.
    pub async fn find_all(&self, query: impl Into<FindQuery>) -> StoreResult<Vec<Record>> {
        self.find_all_stream(query).try_collect().await
    }

    /// Every item of the partition named by the query, fetched page by page
    /// as the stream is polled.
    pub fn find_all_stream(&self, query: impl Into<FindQuery>) -> RecordStream {
        let query = query.into();
        let key = self.keys.derive(&query.conditions);
        let field = key.hash_field;
        let hash = match key.hash {
            Some(Value::String(hash)) if !hash.is_empty() => hash,
            Some(Value::String(_)) | Some(Value::Null) | None => {
                let err = StoreError::validation(
                    self.table_name(),
                    format!("missing key attribute `{field}`"),
                );
                return stream::once(async move { Err(err) }).boxed();
            }
            Some(other) => {
                let err = StoreError::validation(
                    self.table_name(),
                    format!("key attribute `{field}` must be a string, got {other}"),
                );
                return stream::once(async move { Err(err) }).boxed();
            }
        };
        debug!(table = self.table_name(), %hash, "partition query");

        let model = self.model.clone();
        let attributes = query.fields;
        let limit = self.page_size;
        // `None` once the last page has been read; `Some(cursor)` otherwise.
        let first: Option<Option<String>> = Some(None);
        stream::try_unfold(first, move |cursor| {
            let model = model.clone();
            let request = cursor.map(|exclusive_start| QueryRequest {
                hash: hash.clone(),
                attributes: attributes.clone(),
                exclusive_start,
                limit,
            });
            async move {
                let Some(request) = request else {
                    return Ok::<_, StoreError>(None);
                };
                let page = model.query(&request).await?;
                let next = page.last_evaluated.map(Some);
                let items = stream::iter(page.items.into_iter().map(Ok::<_, StoreError>));
                Ok(Some((items, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    // ── Table lifecycle ────────────────────────────────────────────

    pub async fn ensure_tables(&self, options: &TableOptions) -> StoreResult<()> {
        self.model.create_table(options).await
    }

    pub async fn drop_tables(&self) -> StoreResult<()> {
        self.model.delete_table().await
    }
}
