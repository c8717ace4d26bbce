//! Snapshot storage interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::Result;

/// A materialized stream state at a known event version.
///
/// One snapshot per stream; readers replay events with
/// `version > snapshot.version` on top of `state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Event version this state corresponds to.
    pub version: i64,
    /// Opaque JSON state.
    pub state: JsonValue,
    /// RFC3339 timestamp of when the snapshot was taken.
    pub timestamp: String,
}

/// Interface for per-stream snapshot persistence.
///
/// Snapshot writes never touch the event log; an implementer may snapshot
/// asynchronously without affecting the log's invariants.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Get the snapshot for a stream, if one exists.
    async fn get(&self, stream_id: &str) -> Result<Option<Snapshot>>;

    /// Upsert the snapshot for a stream (one row per stream).
    async fn put(&self, stream_id: &str, snapshot: Snapshot) -> Result<()>;

    /// Remove the snapshot for a stream. A no-op if absent.
    async fn delete(&self, stream_id: &str) -> Result<()>;
}
