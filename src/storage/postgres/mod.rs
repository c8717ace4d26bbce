//! PostgreSQL implementations of storage interfaces.

mod entity_store;
mod event_store;
mod snapshot_store;

pub use entity_store::PostgresEntityStore;
pub use event_store::PostgresEventStore;
pub use snapshot_store::PostgresSnapshotStore;
