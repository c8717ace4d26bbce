//! Strata persistence core.
//!
//! A pluggable storage layer: a keyed JSON entity store with PostgreSQL
//! and SQLite adapters behind one trait, a named adapter registry, a
//! batch-oriented schema migration runner with an operator CLI, and an
//! event-sourcing store with per-stream versioning and snapshots.

pub mod config;
pub mod factory;
pub mod interfaces;
pub mod migrate;
pub mod repository;
pub mod storage;
pub mod utils;
