//! The model registry: one adapter per entity over a shared backend.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};
use warehouse_store::{Backend, Model, Record, StoreResult, TableOptions, TableSchema};

use crate::attachment::{DEFAULT_REGISTRY, HttpTarballSource, TarballSource};
use crate::compat::{CompatModel, DEFAULT_PAGE_SIZE, FindQuery, RecordStream};
use crate::error::ModelResult;
use crate::entities::{
    Build, BuildHead, Package, Version, build, build_file, build_head, dependent, dependent_of,
    package, package_cache, release_line, release_line_dep, release_line_head, version,
};
use crate::fanout::exhaustive_join;
use crate::keys::KeyDeriver;

/// Names of every registered entity, in registration order.
pub const ENTITY_NAMES: [&str; 11] = [
    "Build",
    "BuildFile",
    "BuildHead",
    "Package",
    "PackageCache",
    "Version",
    "Dependent",
    "DependentOf",
    "ReleaseLine",
    "ReleaseLineHead",
    "ReleaseLineDep",
];

/// Construction options of [`WarehouseModels`].
#[derive(Clone)]
pub struct RegistryOptions {
    /// Backend page size used by `find_all`.
    pub page_size: usize,
    /// Tarball source used by [`Version`].
    pub tarballs: Arc<dyn TarballSource>,
    /// Registry base URL [`Version`] fetches tarballs from by default.
    pub registry: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            tarballs: Arc::new(HttpTarballSource::default()),
            registry: DEFAULT_REGISTRY.to_string(),
        }
    }
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("page_size", &self.page_size)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Every warehouse entity, bound to one backend.
#[derive(Debug, Clone)]
pub struct WarehouseModels {
    pub build: Build,
    pub build_file: CompatModel,
    pub build_head: BuildHead,
    pub package: Package,
    pub package_cache: CompatModel,
    pub version: Version,
    pub dependent: CompatModel,
    pub dependent_of: CompatModel,
    pub release_line: CompatModel,
    pub release_line_head: CompatModel,
    pub release_line_dep: CompatModel,
}

impl WarehouseModels {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_options(backend, RegistryOptions::default())
    }

    pub fn with_options(backend: Arc<dyn Backend>, options: RegistryOptions) -> Self {
        let adapter = |schema: TableSchema, keys: KeyDeriver| {
            CompatModel::new(Model::define(Arc::clone(&backend), schema), keys)
                .with_page_size(options.page_size)
        };

        // Adapters needed by extensions are built first and cloned in.
        let build_file = adapter(build_file::schema(), build_file::KEYS);
        let package_cache = adapter(package_cache::schema(), package_cache::KEYS);

        Self {
            build: Build::new(adapter(build::schema(), build::KEYS), build_file.clone()),
            build_head: BuildHead::new(
                adapter(build_head::schema(), build_head::KEYS),
                build_file.clone(),
            ),
            package: Package::new(
                adapter(package::schema(), package::KEYS),
                package_cache.clone(),
            ),
            version: Version::new(
                adapter(version::schema(), version::KEYS),
                Arc::clone(&options.tarballs),
                options.registry.clone(),
            ),
            dependent: adapter(dependent::schema(), dependent::KEYS),
            dependent_of: adapter(dependent_of::schema(), dependent_of::KEYS),
            release_line: adapter(release_line::schema(), release_line::KEYS),
            release_line_head: adapter(release_line_head::schema(), release_line_head::KEYS),
            release_line_dep: adapter(release_line_dep::schema(), release_line_dep::KEYS),
            build_file,
            package_cache,
        }
    }

    /// Names of every registered entity.
    pub fn names(&self) -> &'static [&'static str] {
        &ENTITY_NAMES
    }

    /// The adapter of the entity called `name` (e.g. `"BuildHead"`).
    pub fn adapter(&self, name: &str) -> Option<Adapter<'_>> {
        let adapter = match name {
            "Build" => &*self.build,
            "BuildFile" => &self.build_file,
            "BuildHead" => &*self.build_head,
            "Package" => return Some(Adapter::Package(&self.package)),
            "PackageCache" => &self.package_cache,
            "Version" => &*self.version,
            "Dependent" => &self.dependent,
            "DependentOf" => &self.dependent_of,
            "ReleaseLine" => &self.release_line,
            "ReleaseLineHead" => &self.release_line_head,
            "ReleaseLineDep" => &self.release_line_dep,
            _ => return None,
        };
        Some(Adapter::Plain(adapter))
    }

    fn adapters(&self) -> impl Iterator<Item = Adapter<'_>> {
        ENTITY_NAMES.iter().filter_map(|name| self.adapter(name))
    }

    /// Create every table. All branches run to completion; the first error
    /// observed is returned afterwards.
    pub async fn ensure(&self, options: &TableOptions) -> StoreResult<()> {
        exhaustive_join(self.adapters().map(|adapter| async move {
            adapter.ensure_tables(options).await.inspect_err(|e| {
                warn!(table = adapter.table_name(), error = %e, "ensure failed");
            })
        }))
        .await?;
        info!(tables = ENTITY_NAMES.len(), "tables ensured");
        Ok(())
    }

    /// Drop every table, with the same completion contract as
    /// [`WarehouseModels::ensure`].
    pub async fn drop(&self) -> StoreResult<()> {
        exhaustive_join(self.adapters().map(|adapter| async move {
            adapter.drop_tables().await.inspect_err(|e| {
                warn!(table = adapter.table_name(), error = %e, "drop failed");
            })
        }))
        .await?;
        info!(tables = ENTITY_NAMES.len(), "tables dropped");
        Ok(())
    }
}

/// An entity adapter looked up by name.
///
/// Package writes keep going through [`Package`], so they stay mirrored into
/// PackageCache.
#[derive(Debug, Clone, Copy)]
pub enum Adapter<'a> {
    Plain(&'a CompatModel),
    Package(&'a Package),
}

impl Adapter<'_> {
    pub fn table_name(&self) -> &str {
        match self {
            Self::Plain(compat) => compat.table_name(),
            Self::Package(package) => package.table_name(),
        }
    }

    pub async fn create(&self, data: Record) -> ModelResult<Record> {
        match self {
            Self::Plain(compat) => Ok(compat.create(data).await?),
            Self::Package(package) => package.create(data).await,
        }
    }

    pub async fn update(&self, data: Record) -> ModelResult<Record> {
        match self {
            Self::Plain(compat) => Ok(compat.update(data).await?),
            Self::Package(package) => package.update(data).await,
        }
    }

    pub async fn remove(&self, data: &Record) -> ModelResult<()> {
        match self {
            Self::Plain(compat) => Ok(compat.remove(data).await?),
            Self::Package(package) => package.remove(data).await,
        }
    }

    pub async fn get(&self, data: &Record) -> ModelResult<Option<Record>> {
        match self {
            Self::Plain(compat) => Ok(compat.get(data).await?),
            Self::Package(package) => package.get(data).await,
        }
    }

    pub async fn find_one(&self, data: &Record) -> ModelResult<Option<Record>> {
        self.get(data).await
    }

    pub async fn find_all(&self, query: impl Into<FindQuery>) -> ModelResult<Vec<Record>> {
        match self {
            Self::Plain(compat) => Ok(compat.find_all(query).await?),
            Self::Package(package) => package.find_all(query).await,
        }
    }

    pub fn find_all_stream(&self, query: impl Into<FindQuery>) -> RecordStream {
        match self {
            Self::Plain(compat) => compat.find_all_stream(query),
            Self::Package(package) => package.find_all_stream(query),
        }
    }

    pub async fn ensure_tables(&self, options: &TableOptions) -> StoreResult<()> {
        match self {
            Self::Plain(compat) => compat.ensure_tables(options).await,
            Self::Package(package) => package.ensure_tables(options).await,
        }
    }

    pub async fn drop_tables(&self) -> StoreResult<()> {
        match self {
            Self::Plain(compat) => compat.drop_tables().await,
            Self::Package(package) => package.drop_tables().await,
        }
    }
}
