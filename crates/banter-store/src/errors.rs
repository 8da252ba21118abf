//! Error types for the storage subsystem.

use thiserror::Error;

/// Errors that can occur inside the SQLite gateway.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },
}

/// Convenience type alias for storage results.
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for banter_core::StoreError {
    fn from(err: StorageError) -> Self {
        banter_core::StoreError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn migration_error_display() {
        let err = StorageError::Migration {
            message: "v001 failed".into(),
        };
        assert_eq!(err.to_string(), "migration error: v001 failed");
    }

    #[test]
    fn converts_to_contract_error() {
        let err = StorageError::Migration {
            message: "boom".into(),
        };
        let contract: banter_core::StoreError = err.into();
        assert!(contract.to_string().contains("boom"));
    }
}
