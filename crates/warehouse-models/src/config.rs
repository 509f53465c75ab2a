//! warehouse.toml configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use warehouse_store::{Backend, MemoryBackend, RedbBackend, TableOptions};

use crate::attachment::{DEFAULT_REGISTRY, HttpTarballSource};
use crate::compat::DEFAULT_PAGE_SIZE;
use crate::registry::{RegistryOptions, WarehouseModels};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub store: StoreConfig,
    pub registry: RegistryConfig,
    pub query: QueryConfig,
    pub tables: TableOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Database file of the redb backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("warehouse.redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL tarballs are fetched from.
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl WarehouseConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WarehouseConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a warehouse.toml storing data in `path`.
    pub fn scaffold(path: &Path) -> Self {
        WarehouseConfig {
            store: StoreConfig {
                backend: BackendKind::Redb,
                path: path.to_path_buf(),
            },
            tables: TableOptions {
                read_capacity: Some(10),
                write_capacity: Some(10),
            },
            ..Default::default()
        }
    }

    pub fn open_backend(&self) -> anyhow::Result<Arc<dyn Backend>> {
        let backend: Arc<dyn Backend> = match self.store.backend {
            BackendKind::Redb => {
                if let Some(parent) = self.store.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let backend = RedbBackend::open(&self.store.path)?;
                info!(path = ?self.store.path, "redb store opened");
                Arc::new(backend)
            }
            BackendKind::Memory => {
                info!("in-memory store opened");
                Arc::new(MemoryBackend::new())
            }
        };
        Ok(backend)
    }

    pub fn registry_options(&self) -> anyhow::Result<RegistryOptions> {
        let timeout = Duration::from_secs(self.registry.timeout_secs);
        Ok(RegistryOptions {
            page_size: self.query.page_size,
            tarballs: Arc::new(HttpTarballSource::new(timeout)?),
            registry: self.registry.url.clone(),
        })
    }

    /// Open the configured backend and register every model on it.
    pub fn open_models(&self) -> anyhow::Result<WarehouseModels> {
        Ok(WarehouseModels::with_options(
            self.open_backend()?,
            self.registry_options()?,
        ))
    }
}
