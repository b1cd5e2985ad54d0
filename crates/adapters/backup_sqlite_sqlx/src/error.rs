//! Storage-specific error type wrapping sqlx errors.

use edgehub_domain::error::EngineError;

/// Errors originating from the `SQLite` backup store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to deserialize a stored JSON value.
    #[error("JSON deserialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        Self::Backup(err.to_string())
    }
}
