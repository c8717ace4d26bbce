//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{AdapterConfig, AdapterType};
use crate::interfaces::{EntityStore, EventStore, SnapshotStore};

pub mod helpers;
pub mod schema;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use crate::interfaces::{Result, StorageError};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresEntityStore, PostgresEventStore, PostgresSnapshotStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteEntityStore, SqliteEventStore, SqliteSnapshotStore};

/// Initialize storage based on configuration.
///
/// Returns (EntityStore, EventStore, SnapshotStore) implementations backed
/// by the configured engine, sharing one pool.
pub async fn init_storage(
    config: &AdapterConfig,
) -> Result<(
    Arc<dyn EntityStore>,
    Arc<dyn EventStore>,
    Arc<dyn SnapshotStore>,
)> {
    config.validate()?;

    match config.adapter_type {
        #[cfg(feature = "sqlite")]
        AdapterType::Sqlite => {
            info!("storage: sqlite at {}", config.sqlite.path);

            let pool = sqlite::open_pool(&config.sqlite.path).await?;

            Ok((
                Arc::new(SqliteEntityStore::new(pool.clone(), config.table.as_str())),
                Arc::new(SqliteEventStore::new(pool.clone())),
                Arc::new(SqliteSnapshotStore::new(pool)),
            ))
        }
        #[cfg(not(feature = "sqlite"))]
        AdapterType::Sqlite => {
            tracing::error!("sqlite storage requested but 'sqlite' feature is not enabled");
            Err(StorageError::Config("sqlite feature not enabled".into()))
        }
        #[cfg(feature = "postgres")]
        AdapterType::Postgres => {
            info!("storage: postgres");

            let entity_store =
                PostgresEntityStore::connect(&config.postgres.uri, config.table.as_str()).await?;
            let pool = entity_store.pool().clone();

            Ok((
                Arc::new(entity_store),
                Arc::new(PostgresEventStore::new(pool.clone())),
                Arc::new(PostgresSnapshotStore::new(pool)),
            ))
        }
        #[cfg(not(feature = "postgres"))]
        AdapterType::Postgres => {
            tracing::error!("postgres storage requested but 'postgres' feature is not enabled");
            Err(StorageError::Config("postgres feature not enabled".into()))
        }
    }
}
