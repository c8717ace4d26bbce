//! Generic entity storage interface.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::Result;

/// Interface for keyed JSON entity persistence.
///
/// Values are opaque JSON documents addressed by a string key; callers own
/// the document shape. Schema objects are provisioned lazily on first use
/// and at most once per adapter instance.
///
/// Implementations:
/// - `PostgresEntityStore`: relational storage with a JSONB column
/// - `SqliteEntityStore`: embedded single-file storage
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Upsert a value under a key.
    ///
    /// There is no distinction between insert and update; repeated saves of
    /// the same key succeed and leave exactly one row.
    async fn save(&self, key: &str, value: &JsonValue) -> Result<()>;

    /// Load the current value for a key, or `None` if absent.
    ///
    /// A missing key is not an error.
    async fn load(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Remove the row for a key. A no-op if the key is absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Return the stored documents whose top-level fields equal every
    /// field of `filter`.
    ///
    /// The filter is interpreted against fields inside the document, not the
    /// storage envelope. An empty object matches everything; a non-object
    /// filter is malformed input and matches nothing (fails closed).
    async fn query(&self, filter: &JsonValue) -> Result<Vec<JsonValue>>;

    /// Begin a transaction scoped to this store.
    ///
    /// The returned handle exposes save/load/delete bound to the
    /// transaction. Dropping the handle without calling `commit` rolls the
    /// transaction back.
    async fn begin(&self) -> Result<Box<dyn EntityTransaction>>;

    /// Release the underlying pool.
    ///
    /// Drains in-flight work, bounded by a shutdown timeout so a hung
    /// connection cannot block process exit.
    async fn disconnect(&self) -> Result<()>;
}

/// Transaction-scoped entity operations.
///
/// Obtained from [`EntityStore::begin`]. Operations see the transaction's
/// own writes; nothing is visible to other callers until `commit`.
#[async_trait]
pub trait EntityTransaction: Send {
    /// Upsert within the transaction.
    async fn save(&mut self, key: &str, value: &JsonValue) -> Result<()>;

    /// Load within the transaction.
    async fn load(&mut self, key: &str) -> Result<Option<JsonValue>>;

    /// Delete within the transaction.
    async fn delete(&mut self, key: &str) -> Result<()>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Roll the transaction back, discarding all writes.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
