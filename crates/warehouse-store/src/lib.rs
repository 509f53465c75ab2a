//! warehouse-store: storage layer for the package-registry warehouse.
//!
//! Provides the canonical [`Record`] type, static [`TableSchema`]s with
//! store-side schema enforcement, the [`Backend`] capability trait, and the
//! [`Model`] handle that the compatibility layer wraps.
//!
//! # Architecture
//!
//! ```text
//! Model (one per table)
//!   ├── TableSchema (keys, attribute types, timestamps)
//!   └── Arc<dyn Backend>
//!         ├── RedbBackend   (redb, on-disk or in-memory, atomic batches)
//!         └── MemoryBackend (BTreeMap per table, atomic batches)
//! ```
//!
//! Items are addressed by an [`ItemKey`] (hash key plus optional range key)
//! and stored under `"{hash}\0{range}"`, so one partition is one contiguous
//! key range and partition queries never scan other partitions.

pub mod backend;
pub mod error;
pub mod memory;
pub mod model;
pub mod record;
pub mod redb_backend;
pub mod schema;

pub use backend::{Backend, QueryPage, QueryRequest, TableOptions, WriteRequest};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use model::Model;
pub use record::{ItemKey, Record, blob, decode_blob, project};
pub use redb_backend::RedbBackend;
pub use schema::{AttributeType, CREATED_AT, TableSchema, UPDATED_AT};
