//! Shared storage integration tests.
//!
//! Tests the EntityStore, EventStore and SnapshotStore contracts against
//! every backend. Each backend module imports these test functions and
//! runs them through the run_*_tests! macros.

pub mod entity_store_tests;
pub mod event_store_tests;
pub mod snapshot_store_tests;
