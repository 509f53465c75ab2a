//! Error types for the warehouse models.

use thiserror::Error;
use warehouse_store::StoreError;

/// Result type alias for model-level operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by entity extensions on top of the store.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("build file not found: {0}")]
    MissingBuildFile(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid registry url: {0}")]
    InvalidUrl(String),

    #[error("HTTP statuscode {0}")]
    HttpStatus(u16),

    #[error("tarball fetch failed: {0}")]
    Fetch(String),
}

impl ModelError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
