//! Error types for the store module.

use cofhe_sdk_permits::PermitError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Permit or account lookup miss.
    #[error("not found: {0}")]
    NotFound(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Permit serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding the store was poisoned.
    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("permit error: {0}")]
    Permit(#[from] PermitError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
