use thiserror::Error;

use crate::{CounterKey, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// The stored version did not match the version the caller read.
    #[error(
        "Concurrency conflict for {collection}/{id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        collection: String,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// Another document already holds this unique key.
    #[error("Unique key violation in {collection}: {key} = {value}")]
    UniqueViolation {
        collection: String,
        key: String,
        value: String,
    },

    /// The counter was never initialized.
    #[error("Counter not found: {0}")]
    CounterNotFound(CounterKey),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocumentStoreError>;
