//! SQLite implementations of storage interfaces.
//!
//! A single-file embedded engine with no server process. All stores share
//! one single-connection pool, which serializes mutating operations; that,
//! not multi-connection isolation levels, is what "transaction" means here.

mod entity_store;
mod event_store;
mod snapshot_store;

pub use entity_store::SqliteEntityStore;
pub use event_store::SqliteEventStore;
pub use snapshot_store::SqliteSnapshotStore;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::interfaces::{Result, StorageError};

/// Open (creating if missing) the SQLite database at `path`.
///
/// The pool holds exactly one connection: SQLite is single-writer, and one
/// connection gives every multi-statement sequence exclusive access.
pub async fn open_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(StorageError::Connection)
}
