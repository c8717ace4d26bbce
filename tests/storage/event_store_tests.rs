//! EventStore interface tests.
//!
//! These tests verify the contract of the EventStore trait.
//! Each storage implementation should run these tests.

use serde_json::json;

use strata::interfaces::{EventStore, NewEvent};

/// Create a test event with an index baked into its payload.
pub fn make_event(i: i64, event_type: &str) -> NewEvent {
    NewEvent::new(event_type, json!({"index": i}))
}

/// Create multiple sequential events.
pub fn make_events(start: i64, count: i64) -> Vec<NewEvent> {
    (start..start + count)
        .map(|i| make_event(i, &format!("Event{}", i)))
        .collect()
}

// =============================================================================
// EventStore::append tests
// =============================================================================

pub async fn test_append_single_event<S: EventStore>(store: &S) {
    let stream = "test_append_single";

    let recorded = store
        .append(stream, vec![make_event(0, "Created")])
        .await
        .expect("append should succeed");

    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].stream_id, stream);
    assert_eq!(recorded[0].event_type, "Created");
    assert_eq!(recorded[0].metadata.version, 0, "first version should be 0");
    assert!(!recorded[0].metadata.timestamp.is_empty());
}

pub async fn test_append_assigns_contiguous_versions<S: EventStore>(store: &S) {
    let stream = "test_append_contiguous";

    let first = store
        .append(stream, make_events(0, 3))
        .await
        .expect("first append should succeed");
    let second = store
        .append(stream, make_events(3, 2))
        .await
        .expect("second append should succeed");

    let versions: Vec<i64> = first
        .iter()
        .chain(second.iter())
        .map(|e| e.metadata.version)
        .collect();
    assert_eq!(versions, vec![0, 1, 2, 3, 4], "versions should be gapless");
}

pub async fn test_append_empty_is_noop<S: EventStore>(store: &S) {
    let stream = "test_append_empty";

    let recorded = store
        .append(stream, vec![])
        .await
        .expect("empty append should succeed");
    assert!(recorded.is_empty());

    assert_eq!(
        store.next_version(stream).await.unwrap(),
        0,
        "empty append should not advance the stream"
    );
}

pub async fn test_append_carries_user_id<S: EventStore>(store: &S) {
    let stream = "test_append_user";

    let event = NewEvent::new("Tagged", json!({"x": 1})).with_user("operator-7");
    let recorded = store
        .append(stream, vec![event])
        .await
        .expect("append should succeed");

    assert_eq!(recorded[0].metadata.user_id.as_deref(), Some("operator-7"));

    let read_back = store.read(stream).await.expect("read should succeed");
    assert_eq!(read_back[0].metadata.user_id.as_deref(), Some("operator-7"));
}

// =============================================================================
// EventStore::read tests
// =============================================================================

pub async fn test_read_returns_events_in_order<S: EventStore>(store: &S) {
    let stream = "test_read_order";

    store
        .append(stream, make_events(0, 5))
        .await
        .expect("append should succeed");

    let events = store.read(stream).await.expect("read should succeed");
    assert_eq!(events.len(), 5);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.metadata.version, i as i64, "events should be ordered");
        assert_eq!(event.data, json!({"index": i as i64}));
    }
}

pub async fn test_read_missing_stream_is_empty<S: EventStore>(store: &S) {
    let events = store
        .read("test_read_missing")
        .await
        .expect("read should succeed");
    assert!(events.is_empty(), "unknown stream should read as empty");
}

pub async fn test_read_stream_isolation<S: EventStore>(store: &S) {
    store
        .append("test_iso_a", make_events(0, 3))
        .await
        .unwrap();
    store
        .append("test_iso_b", make_events(0, 5))
        .await
        .unwrap();

    let a = store.read("test_iso_a").await.unwrap();
    let b = store.read("test_iso_b").await.unwrap();

    assert_eq!(a.len(), 3);
    assert_eq!(b.len(), 5);
    assert!(a.iter().all(|e| e.stream_id == "test_iso_a"));
    assert!(b.iter().all(|e| e.stream_id == "test_iso_b"));
}

// =============================================================================
// EventStore::read_from tests
// =============================================================================

pub async fn test_read_from_zero_returns_all<S: EventStore>(store: &S) {
    let stream = "test_read_from_zero";

    store.append(stream, make_events(0, 5)).await.unwrap();

    let events = store
        .read_from(stream, 0)
        .await
        .expect("read_from should succeed");
    assert_eq!(events.len(), 5);
}

pub async fn test_read_from_middle<S: EventStore>(store: &S) {
    let stream = "test_read_from_mid";

    store.append(stream, make_events(0, 10)).await.unwrap();

    let events = store
        .read_from(stream, 5)
        .await
        .expect("read_from should succeed");
    assert_eq!(events.len(), 5, "should return versions 5 through 9");
    assert_eq!(events[0].metadata.version, 5);
    assert_eq!(events.last().unwrap().metadata.version, 9);
}

pub async fn test_read_from_beyond_end_is_empty<S: EventStore>(store: &S) {
    let stream = "test_read_from_end";

    store.append(stream, make_events(0, 5)).await.unwrap();

    let events = store
        .read_from(stream, 100)
        .await
        .expect("read_from should succeed");
    assert!(events.is_empty());
}

// =============================================================================
// EventStore::next_version tests
// =============================================================================

pub async fn test_next_version_empty_stream<S: EventStore>(store: &S) {
    let next = store
        .next_version("test_next_empty")
        .await
        .expect("next_version should succeed");
    assert_eq!(next, 0, "empty stream should have next version 0");
}

pub async fn test_next_version_advances<S: EventStore>(store: &S) {
    let stream = "test_next_advances";

    assert_eq!(store.next_version(stream).await.unwrap(), 0);

    store.append(stream, vec![make_event(0, "E0")]).await.unwrap();
    assert_eq!(store.next_version(stream).await.unwrap(), 1);

    store.append(stream, make_events(1, 3)).await.unwrap();
    assert_eq!(store.next_version(stream).await.unwrap(), 4);
}

// =============================================================================
// Concurrency tests
// =============================================================================

pub async fn test_concurrent_appends_never_share_versions<S: EventStore>(store: &S) {
    let stream = "test_concurrent_append";

    // Either appender may lose a serialization race; the invariant is
    // that whatever was recorded has distinct, gapless versions.
    let (a, b) = tokio::join!(
        store.append(stream, make_events(0, 3)),
        store.append(stream, make_events(100, 3)),
    );
    let succeeded = [a, b].iter().filter(|r| r.is_ok()).count();
    assert!(succeeded >= 1, "at least one appender should succeed");

    let events = store.read(stream).await.expect("read should succeed");
    assert_eq!(events.len(), succeeded * 3);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.metadata.version, i as i64, "versions must be gapless");
    }
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all EventStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_event_store_tests {
    ($store:expr) => {
        use $crate::storage::event_store_tests::*;

        test_append_single_event($store).await;
        println!("  test_append_single_event: PASSED");

        test_append_assigns_contiguous_versions($store).await;
        println!("  test_append_assigns_contiguous_versions: PASSED");

        test_append_empty_is_noop($store).await;
        println!("  test_append_empty_is_noop: PASSED");

        test_append_carries_user_id($store).await;
        println!("  test_append_carries_user_id: PASSED");

        test_read_returns_events_in_order($store).await;
        println!("  test_read_returns_events_in_order: PASSED");

        test_read_missing_stream_is_empty($store).await;
        println!("  test_read_missing_stream_is_empty: PASSED");

        test_read_stream_isolation($store).await;
        println!("  test_read_stream_isolation: PASSED");

        test_read_from_zero_returns_all($store).await;
        println!("  test_read_from_zero_returns_all: PASSED");

        test_read_from_middle($store).await;
        println!("  test_read_from_middle: PASSED");

        test_read_from_beyond_end_is_empty($store).await;
        println!("  test_read_from_beyond_end_is_empty: PASSED");

        test_next_version_empty_stream($store).await;
        println!("  test_next_version_empty_stream: PASSED");

        test_next_version_advances($store).await;
        println!("  test_next_version_advances: PASSED");

        test_concurrent_appends_never_share_versions($store).await;
        println!("  test_concurrent_appends_never_share_versions: PASSED");
    };
}
