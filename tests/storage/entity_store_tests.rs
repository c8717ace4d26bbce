//! EntityStore interface tests.
//!
//! These tests verify the contract of the EntityStore trait.
//! Each storage implementation should run these tests.

use serde_json::json;

use strata::interfaces::EntityStore;

// =============================================================================
// save / load / delete tests
// =============================================================================

pub async fn test_save_load_roundtrip<S: EntityStore>(store: &S) {
    let doc = json!({"name": "ada", "age": 36});

    store.save("test_roundtrip", &doc).await.expect("save should succeed");

    let loaded = store.load("test_roundtrip").await.expect("load should succeed");
    assert_eq!(loaded, Some(doc), "loaded document should match saved");
}

pub async fn test_load_missing_key<S: EntityStore>(store: &S) {
    let loaded = store
        .load("test_missing_key")
        .await
        .expect("load should succeed");
    assert!(loaded.is_none(), "missing key should load as None");
}

pub async fn test_save_overwrites_existing_key<S: EntityStore>(store: &S) {
    store
        .save("test_overwrite", &json!({"marker": "overwrite", "v": 1}))
        .await
        .expect("first save should succeed");
    store
        .save("test_overwrite", &json!({"marker": "overwrite", "v": 2}))
        .await
        .expect("second save should succeed");

    let loaded = store.load("test_overwrite").await.expect("load should succeed");
    assert_eq!(loaded, Some(json!({"marker": "overwrite", "v": 2})));

    // The upsert must leave exactly one row behind, not two.
    let matches = store
        .query(&json!({"marker": "overwrite"}))
        .await
        .expect("query should succeed");
    assert_eq!(matches.len(), 1, "overwriting a key should not add a row");
}

pub async fn test_delete_then_load<S: EntityStore>(store: &S) {
    store
        .save("test_delete", &json!({"alive": true}))
        .await
        .expect("save should succeed");

    store.delete("test_delete").await.expect("delete should succeed");

    let loaded = store.load("test_delete").await.expect("load should succeed");
    assert!(loaded.is_none(), "deleted key should load as None");
}

pub async fn test_delete_missing_key_is_noop<S: EntityStore>(store: &S) {
    store
        .delete("test_delete_missing")
        .await
        .expect("deleting a missing key should succeed");
}

pub async fn test_save_nested_document<S: EntityStore>(store: &S) {
    let doc = json!({
        "profile": {"name": "grace", "langs": ["cobol", "fortran"]},
        "active": true,
        "score": 99.5,
    });

    store.save("test_nested", &doc).await.expect("save should succeed");

    let loaded = store.load("test_nested").await.expect("load should succeed");
    assert_eq!(loaded, Some(doc), "nested structure should survive intact");
}

// =============================================================================
// query tests
// =============================================================================

pub async fn test_query_equality_single_field<S: EntityStore>(store: &S) {
    store
        .save("test_q1_a", &json!({"suite": "q1", "kind": "a", "n": 1}))
        .await
        .unwrap();
    store
        .save("test_q1_b", &json!({"suite": "q1", "kind": "a", "n": 2}))
        .await
        .unwrap();
    store
        .save("test_q1_c", &json!({"suite": "q1", "kind": "b", "n": 1}))
        .await
        .unwrap();

    let matches = store
        .query(&json!({"suite": "q1", "kind": "a"}))
        .await
        .expect("query should succeed");
    assert_eq!(matches.len(), 2, "two documents have kind=a");
    for doc in &matches {
        assert_eq!(doc["kind"], "a");
    }
}

pub async fn test_query_equality_conjunction<S: EntityStore>(store: &S) {
    store
        .save("test_q2_a", &json!({"suite": "q2", "kind": "a", "n": 1}))
        .await
        .unwrap();
    store
        .save("test_q2_b", &json!({"suite": "q2", "kind": "a", "n": 2}))
        .await
        .unwrap();

    let matches = store
        .query(&json!({"suite": "q2", "kind": "a", "n": 2}))
        .await
        .expect("query should succeed");
    assert_eq!(matches.len(), 1, "conjunction should narrow to one document");
    assert_eq!(matches[0]["n"], 2);

    let matches = store
        .query(&json!({"suite": "q2", "kind": "a", "n": 99}))
        .await
        .expect("query should succeed");
    assert!(matches.is_empty(), "one mismatched field fails the whole filter");
}

pub async fn test_query_number_not_matched_by_string<S: EntityStore>(store: &S) {
    store
        .save("test_q3", &json!({"suite": "q3", "n": 7}))
        .await
        .unwrap();

    let matches = store
        .query(&json!({"suite": "q3", "n": "7"}))
        .await
        .expect("query should succeed");
    assert!(matches.is_empty(), "string \"7\" should not match number 7");
}

pub async fn test_query_empty_filter_matches_all<S: EntityStore>(store: &S) {
    store
        .save("test_q4", &json!({"suite": "q4"}))
        .await
        .unwrap();

    let matches = store.query(&json!({})).await.expect("query should succeed");
    assert!(
        matches.iter().any(|d| d["suite"] == "q4"),
        "empty filter should return every document"
    );
}

pub async fn test_query_non_object_filter_matches_none<S: EntityStore>(store: &S) {
    store
        .save("test_q5", &json!({"suite": "q5"}))
        .await
        .unwrap();

    let matches = store
        .query(&json!("suite"))
        .await
        .expect("query should succeed");
    assert!(matches.is_empty(), "string filter should match nothing");

    let matches = store.query(&json!(42)).await.expect("query should succeed");
    assert!(matches.is_empty(), "number filter should match nothing");
}

pub async fn test_query_null_value_matches_stored_null<S: EntityStore>(store: &S) {
    store
        .save("test_q6_null", &json!({"suite": "q6", "tag": "null", "b": null}))
        .await
        .unwrap();
    store
        .save("test_q6_one", &json!({"suite": "q6", "tag": "one", "b": 1}))
        .await
        .unwrap();
    store
        .save("test_q6_absent", &json!({"suite": "q6", "tag": "absent"}))
        .await
        .unwrap();

    let matches = store
        .query(&json!({"suite": "q6", "b": null}))
        .await
        .expect("query should succeed");
    assert_eq!(
        matches.len(),
        1,
        "null must match a stored null, not an absent field"
    );
    assert_eq!(matches[0]["tag"], "null");
}

pub async fn test_query_no_matches<S: EntityStore>(store: &S) {
    let matches = store
        .query(&json!({"suite": "never_written_anywhere"}))
        .await
        .expect("query should succeed");
    assert!(matches.is_empty());
}

// =============================================================================
// transaction tests
// =============================================================================

pub async fn test_transaction_commit_persists<S: EntityStore>(store: &S) {
    let mut tx = store.begin().await.expect("begin should succeed");
    tx.save("test_tx_commit", &json!({"committed": true}))
        .await
        .expect("tx save should succeed");
    tx.commit().await.expect("commit should succeed");

    let loaded = store
        .load("test_tx_commit")
        .await
        .expect("load should succeed");
    assert_eq!(loaded, Some(json!({"committed": true})));
}

pub async fn test_transaction_rollback_discards<S: EntityStore>(store: &S) {
    store
        .save("test_tx_rollback", &json!({"v": "before"}))
        .await
        .expect("save should succeed");

    let mut tx = store.begin().await.expect("begin should succeed");
    tx.save("test_tx_rollback", &json!({"v": "inside"}))
        .await
        .expect("tx save should succeed");
    tx.delete("test_tx_rollback").await.expect("tx delete should succeed");
    tx.rollback().await.expect("rollback should succeed");

    let loaded = store
        .load("test_tx_rollback")
        .await
        .expect("load should succeed");
    assert_eq!(
        loaded,
        Some(json!({"v": "before"})),
        "rollback should leave prior state untouched"
    );
}

pub async fn test_transaction_reads_own_writes<S: EntityStore>(store: &S) {
    let mut tx = store.begin().await.expect("begin should succeed");
    tx.save("test_tx_row", &json!({"n": 1}))
        .await
        .expect("tx save should succeed");

    let seen = tx.load("test_tx_row").await.expect("tx load should succeed");
    assert_eq!(seen, Some(json!({"n": 1})), "tx should see its own write");

    tx.rollback().await.expect("rollback should succeed");

    let loaded = store
        .load("test_tx_row")
        .await
        .expect("load should succeed");
    assert!(loaded.is_none(), "rolled-back write should not persist");
}

pub async fn test_transaction_multiple_operations<S: EntityStore>(store: &S) {
    store
        .save("test_tx_multi_old", &json!({"keep": false}))
        .await
        .unwrap();

    let mut tx = store.begin().await.expect("begin should succeed");
    tx.save("test_tx_multi_a", &json!({"n": 1})).await.unwrap();
    tx.save("test_tx_multi_b", &json!({"n": 2})).await.unwrap();
    tx.delete("test_tx_multi_old").await.unwrap();
    tx.commit().await.expect("commit should succeed");

    assert_eq!(
        store.load("test_tx_multi_a").await.unwrap(),
        Some(json!({"n": 1}))
    );
    assert_eq!(
        store.load("test_tx_multi_b").await.unwrap(),
        Some(json!({"n": 2}))
    );
    assert!(store.load("test_tx_multi_old").await.unwrap().is_none());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all EntityStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_entity_store_tests {
    ($store:expr) => {
        use $crate::storage::entity_store_tests::*;

        test_save_load_roundtrip($store).await;
        println!("  test_save_load_roundtrip: PASSED");

        test_load_missing_key($store).await;
        println!("  test_load_missing_key: PASSED");

        test_save_overwrites_existing_key($store).await;
        println!("  test_save_overwrites_existing_key: PASSED");

        test_delete_then_load($store).await;
        println!("  test_delete_then_load: PASSED");

        test_delete_missing_key_is_noop($store).await;
        println!("  test_delete_missing_key_is_noop: PASSED");

        test_save_nested_document($store).await;
        println!("  test_save_nested_document: PASSED");

        test_query_equality_single_field($store).await;
        println!("  test_query_equality_single_field: PASSED");

        test_query_equality_conjunction($store).await;
        println!("  test_query_equality_conjunction: PASSED");

        test_query_number_not_matched_by_string($store).await;
        println!("  test_query_number_not_matched_by_string: PASSED");

        test_query_empty_filter_matches_all($store).await;
        println!("  test_query_empty_filter_matches_all: PASSED");

        test_query_non_object_filter_matches_none($store).await;
        println!("  test_query_non_object_filter_matches_none: PASSED");

        test_query_null_value_matches_stored_null($store).await;
        println!("  test_query_null_value_matches_stored_null: PASSED");

        test_query_no_matches($store).await;
        println!("  test_query_no_matches: PASSED");

        test_transaction_commit_persists($store).await;
        println!("  test_transaction_commit_persists: PASSED");

        test_transaction_rollback_discards($store).await;
        println!("  test_transaction_rollback_discards: PASSED");

        test_transaction_reads_own_writes($store).await;
        println!("  test_transaction_reads_own_writes: PASSED");

        test_transaction_multiple_operations($store).await;
        println!("  test_transaction_multiple_operations: PASSED");
    };
}
