//! SnapshotStore interface tests.
//!
//! These tests verify the contract of the SnapshotStore trait.
//! Each storage implementation should run these tests.

use serde_json::json;

use strata::interfaces::{EventStore, NewEvent, Snapshot, SnapshotStore};

fn make_snapshot(version: i64, state: serde_json::Value) -> Snapshot {
    Snapshot {
        version,
        state,
        timestamp: "2026-01-01T00:00:00Z".to_string(),
    }
}

// =============================================================================
// get / put / delete tests
// =============================================================================

pub async fn test_get_missing_snapshot<S: SnapshotStore>(store: &S) {
    let snapshot = store
        .get("test_snap_missing")
        .await
        .expect("get should succeed");
    assert!(snapshot.is_none(), "unknown stream should have no snapshot");
}

pub async fn test_put_then_get<S: SnapshotStore>(store: &S) {
    let stream = "test_snap_roundtrip";

    store
        .put(stream, make_snapshot(5, json!({"count": 42})))
        .await
        .expect("put should succeed");

    let snapshot = store
        .get(stream)
        .await
        .expect("get should succeed")
        .expect("snapshot should exist");
    assert_eq!(snapshot.version, 5);
    assert_eq!(snapshot.state, json!({"count": 42}));
    assert_eq!(snapshot.timestamp, "2026-01-01T00:00:00Z");
}

pub async fn test_put_overwrites_existing<S: SnapshotStore>(store: &S) {
    let stream = "test_snap_overwrite";

    store
        .put(stream, make_snapshot(3, json!({"count": 10})))
        .await
        .expect("first put should succeed");
    store
        .put(stream, make_snapshot(9, json!({"count": 90})))
        .await
        .expect("second put should succeed");

    let snapshot = store
        .get(stream)
        .await
        .expect("get should succeed")
        .expect("snapshot should exist");
    assert_eq!(snapshot.version, 9, "later put should win");
    assert_eq!(snapshot.state, json!({"count": 90}));
}

pub async fn test_delete_snapshot<S: SnapshotStore>(store: &S) {
    let stream = "test_snap_delete";

    store
        .put(stream, make_snapshot(1, json!({})))
        .await
        .expect("put should succeed");
    store.delete(stream).await.expect("delete should succeed");

    let snapshot = store.get(stream).await.expect("get should succeed");
    assert!(snapshot.is_none(), "deleted snapshot should be gone");

    // Deleting again is a no-op, not an error.
    store.delete(stream).await.expect("second delete should succeed");
}

pub async fn test_stream_isolation<S: SnapshotStore>(store: &S) {
    store
        .put("test_snap_iso_a", make_snapshot(1, json!({"who": "a"})))
        .await
        .unwrap();
    store
        .put("test_snap_iso_b", make_snapshot(2, json!({"who": "b"})))
        .await
        .unwrap();

    let a = store.get("test_snap_iso_a").await.unwrap().unwrap();
    let b = store.get("test_snap_iso_b").await.unwrap().unwrap();
    assert_eq!(a.state, json!({"who": "a"}));
    assert_eq!(b.state, json!({"who": "b"}));

    store.delete("test_snap_iso_a").await.unwrap();
    assert!(store.get("test_snap_iso_b").await.unwrap().is_some());
}

// =============================================================================
// Replay integration tests
// =============================================================================

/// A snapshot at version N plus read_from(N + 1) reconstructs the stream
/// without touching events the snapshot already covers.
pub async fn test_snapshot_plus_tail_replay<E, S>(events: &E, snapshots: &S)
where
    E: EventStore,
    S: SnapshotStore,
{
    let stream = "test_snap_replay";

    for i in 0..10 {
        events
            .append(stream, vec![NewEvent::new("Tick", json!({"i": i}))])
            .await
            .expect("append should succeed");
    }

    snapshots
        .put(stream, make_snapshot(5, json!({"sum_through": 5})))
        .await
        .expect("put should succeed");

    let snapshot = snapshots
        .get(stream)
        .await
        .expect("get should succeed")
        .expect("snapshot should exist");
    let tail = events
        .read_from(stream, snapshot.version + 1)
        .await
        .expect("read_from should succeed");

    assert_eq!(tail.len(), 4, "tail should hold versions 6 through 9");
    assert_eq!(tail[0].metadata.version, 6);
    assert_eq!(tail.last().unwrap().metadata.version, 9);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all SnapshotStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_snapshot_store_tests {
    ($store:expr) => {
        use $crate::storage::snapshot_store_tests::*;

        test_get_missing_snapshot($store).await;
        println!("  test_get_missing_snapshot: PASSED");

        test_put_then_get($store).await;
        println!("  test_put_then_get: PASSED");

        test_put_overwrites_existing($store).await;
        println!("  test_put_overwrites_existing: PASSED");

        test_delete_snapshot($store).await;
        println!("  test_delete_snapshot: PASSED");

        test_stream_isolation($store).await;
        println!("  test_stream_isolation: PASSED");
    };
}
