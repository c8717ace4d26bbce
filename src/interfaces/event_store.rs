//! Event storage interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::Result;

/// An event to append, before the store assigns its version and timestamp.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Event type discriminator.
    pub event_type: String,
    /// Opaque JSON payload.
    pub data: JsonValue,
    /// Acting user, if known.
    pub user_id: Option<String>,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>, data: JsonValue) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Server-assigned event metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Position within the stream. Contiguous from 0, no gaps.
    pub version: i64,
    /// RFC3339 timestamp stamped at append time.
    pub timestamp: String,
    /// Acting user, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// An event as stored, with its assigned metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub stream_id: String,
    pub event_type: String,
    pub data: JsonValue,
    pub metadata: EventMetadata,
}

/// Interface for append-only per-stream event persistence.
///
/// For a fixed stream, versions are contiguous non-negative integers
/// starting at 0. The next version is computed as max(existing) + 1 inside
/// the same transaction as the insert, so concurrent appenders can never
/// produce duplicate versions.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append events to a stream, all-or-nothing.
    ///
    /// Versions are assigned in array order; a server-side timestamp is
    /// stamped on each event. Returns the events as recorded.
    async fn append(&self, stream_id: &str, events: Vec<NewEvent>) -> Result<Vec<RecordedEvent>>;

    /// Retrieve all events for a stream, ordered by version ascending.
    async fn read(&self, stream_id: &str) -> Result<Vec<RecordedEvent>>;

    /// Retrieve events with `version >= from_version`, ascending.
    ///
    /// No upper bound; callers combine with snapshots for bounded replay.
    async fn read_from(&self, stream_id: &str, from_version: i64) -> Result<Vec<RecordedEvent>>;

    /// The version the next appended event would receive.
    async fn next_version(&self, stream_id: &str) -> Result<i64>;
}
