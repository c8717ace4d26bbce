//! Storage configuration types.

use serde::Deserialize;

use crate::interfaces::{Result, StorageError};

/// Storage backend discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    #[default]
    Sqlite,
    Postgres,
}

/// Configuration for one storage adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Backend discriminator.
    #[serde(rename = "type")]
    pub adapter_type: AdapterType,
    /// PostgreSQL-specific configuration.
    pub postgres: PostgresConfig,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
    /// Entity table name. Adapter configuration, treated as a trusted
    /// identifier; never sourced from user input.
    pub table: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            adapter_type: AdapterType::Sqlite,
            postgres: PostgresConfig::default(),
            sqlite: SqliteConfig::default(),
            table: "entities".to_string(),
        }
    }
}

impl AdapterConfig {
    /// Check the configuration is complete for its adapter type.
    ///
    /// Called before any I/O so incomplete config fails fast with a
    /// descriptive error instead of surfacing as a connection failure.
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(StorageError::Config(
                "entity table name must not be empty".into(),
            ));
        }
        if !self
            .table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StorageError::Config(format!(
                "entity table name {:?} is not a valid identifier",
                self.table
            )));
        }

        match self.adapter_type {
            AdapterType::Postgres if self.postgres.uri.trim().is_empty() => Err(
                StorageError::Config("postgres adapter requires a connection uri".into()),
            ),
            AdapterType::Sqlite if self.sqlite.path.trim().is_empty() => Err(StorageError::Config(
                "sqlite adapter requires a database file path".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// PostgreSQL-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// PostgreSQL connection URI.
    pub uri: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://localhost:5432/strata".to_string(),
        }
    }
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path. Parent directories are created on open.
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "data/strata.db".to_string(),
        }
    }
}
