//! Snapshot-accelerated stream reads.

use serde_json::Value as JsonValue;

use crate::interfaces::{EventStore, RecordedEvent, Result, SnapshotStore};

/// A stream's materialized starting point plus the events after it.
#[derive(Debug)]
pub struct StreamState {
    /// State captured by the snapshot, if one exists.
    pub state: Option<JsonValue>,
    /// Events with versions greater than the snapshot's, ascending.
    pub events: Vec<RecordedEvent>,
    /// Highest version seen across snapshot and events, if any.
    pub version: Option<i64>,
}

/// Load a stream for replay: the latest snapshot, if any, plus every
/// event recorded after it. Callers fold `events` over `state` to get
/// the current state without replaying the whole stream.
pub async fn load_stream(
    events: &dyn EventStore,
    snapshots: &dyn SnapshotStore,
    stream_id: &str,
) -> Result<StreamState> {
    let snapshot = snapshots.get(stream_id).await?;
    let from_version = snapshot.as_ref().map(|s| s.version + 1).unwrap_or(0);

    let tail = events.read_from(stream_id, from_version).await?;

    let version = tail
        .last()
        .map(|e| e.metadata.version)
        .or_else(|| snapshot.as_ref().map(|s| s.version));

    Ok(StreamState {
        state: snapshot.map(|s| s.state),
        events: tail,
        version,
    })
}
