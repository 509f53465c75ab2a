//! Error types for the warehouse store layer.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The item shape was rejected by the table schema.
    Validation,
    /// Connectivity, transaction, or other operational failure.
    Store,
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed for {table}: {reason}")]
    Validation { table: String, reason: String },

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Build a validation error for the given table.
    pub fn validation(table: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            _ => ErrorKind::Store,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_classified() {
        let err = StoreError::validation("WarehouseBuild", "missing hash key `key`");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "validation failed for WarehouseBuild: missing hash key `key`"
        );
    }

    #[test]
    fn operational_errors_are_store_kind() {
        assert_eq!(StoreError::Read("io".into()).kind(), ErrorKind::Store);
        assert_eq!(
            StoreError::TableNotFound("WarehouseBuild".into()).kind(),
            ErrorKind::Store
        );
    }
}
