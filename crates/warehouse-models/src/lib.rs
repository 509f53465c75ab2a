//! Data models of the package warehouse.
//!
//! Eleven entities (builds, build files, packages, versions, dependents and
//! release lines) are stored through a [`warehouse_store::Backend`]. Each
//! entity is reached through a [`CompatModel`], which derives its physical
//! key from the entity's logical identity and offers CRUD plus buffered or
//! streamed partition queries. A few entities add derived-value extensions:
//!
//! - Build / BuildHead resolve their file list ([`Build::fetch_files`]).
//! - Package mirrors every write into PackageCache in one batch and decodes
//!   `config` on read ([`Package`]).
//! - Version attaches the package tarball from the configured registry
//!   ([`Version::get_attachment`]).
//!
//! [`WarehouseModels`] wires every adapter to one backend and manages the
//! tables as a whole.

pub mod attachment;
pub mod compat;
pub mod config;
pub mod entities;
pub mod error;
pub mod fanout;
pub mod files;
pub mod keys;
pub mod registry;

pub use attachment::{HttpTarballSource, TarballSource};
pub use compat::{CompatModel, DEFAULT_PAGE_SIZE, FindQuery, RecordStream};
pub use config::WarehouseConfig;
pub use entities::{Build, BuildHead, Package, Version};
pub use error::{ModelError, ModelResult};
pub use keys::{HashKey, KeyDeriver, PhysicalKey};
pub use registry::{Adapter, ENTITY_NAMES, RegistryOptions, WarehouseModels};
