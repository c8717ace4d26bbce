//! Storage interfaces.
//!
//! The traits every backing store implements, plus the shared error type.
//! Concrete implementations live under `crate::storage`.

mod entity_store;
mod event_store;
mod snapshot_store;

pub use entity_store::{EntityStore, EntityTransaction};
pub use event_store::{EventMetadata, EventStore, NewEvent, RecordedEvent};
pub use snapshot_store::{Snapshot, SnapshotStore};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// The variants are the caller-facing taxonomy: configuration problems are
/// raised before any I/O, connectivity problems are distinct from query
/// failures, and constraint violations are surfaced verbatim rather than
/// swallowed.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("constraint violation: {0}")]
    Constraint(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("migration {id} failed: {source}")]
    Migration {
        id: String,
        #[source]
        source: Box<StorageError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StorageError::Connection(e),
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Constraint(e),
            _ => StorageError::Database(e),
        }
    }
}

impl StorageError {
    /// True for errors caused by unreachable or closed backing engines.
    pub fn is_connection(&self) -> bool {
        matches!(self, StorageError::Connection(_))
    }

    /// True for uniqueness/consistency violations reported by the engine.
    pub fn is_constraint(&self) -> bool {
        matches!(self, StorageError::Constraint(_))
    }
}
