//! Storage-specific error type wrapping sqlx errors.

use unictl_domain::error::UnictlError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize a value into its JSON column.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for UnictlError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
