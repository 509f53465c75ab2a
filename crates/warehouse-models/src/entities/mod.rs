//! Per-entity table schemas, key derivers, and extension wrappers.
//!
//! Each module declares the physical table of one logical entity. Entities
//! with derived-value extensions also expose a wrapper struct that holds the
//! entity's [`CompatModel`](crate::CompatModel) plus whatever other adapters
//! the extension needs, and dereferences to the adapter for plain CRUD.

pub mod build;
pub mod build_file;
pub mod build_head;
pub mod dependent;
pub mod dependent_of;
pub mod package;
pub mod package_cache;
pub mod release_line;
pub mod release_line_dep;
pub mod release_line_head;
pub mod version;

pub use build::Build;
pub use build_head::BuildHead;
pub use package::Package;
pub use version::Version;
