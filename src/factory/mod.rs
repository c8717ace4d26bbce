//! Adapter registry.
//!
//! Maps logical store names to shared entity-store adapters. The registry
//! is an explicit value passed to call sites; there is no ambient global,
//! and callers own the shutdown calls (`remove` / `remove_all`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::AdapterConfig;
use crate::interfaces::{EntityStore, Result};

/// Registry of named entity-store adapters.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Mutex<HashMap<String, Arc<dyn EntityStore>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Mutex::new(HashMap::new()),
        }
    }

    /// Return the adapter registered under `name`, constructing it from
    /// `config` if absent.
    ///
    /// Creation is idempotent per name: a second call with the same name
    /// returns the existing adapter untouched, whatever its config says.
    pub async fn create(
        &self,
        name: &str,
        config: &AdapterConfig,
    ) -> Result<Arc<dyn EntityStore>> {
        // Validate before any I/O, even when the name already exists.
        config.validate()?;

        let mut adapters = self.adapters.lock().await;
        if let Some(existing) = adapters.get(name) {
            return Ok(existing.clone());
        }

        let adapter = build_adapter(config).await?;
        info!(name, "registered storage adapter");
        adapters.insert(name.to_string(), adapter.clone());

        Ok(adapter)
    }

    /// Look up a previously created adapter.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn EntityStore>> {
        self.adapters.lock().await.get(name).cloned()
    }

    /// Shut down and forget the adapter under `name`.
    ///
    /// Unknown names are a no-op.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let removed = self.adapters.lock().await.remove(name);
        if let Some(adapter) = removed {
            adapter.disconnect().await?;
            info!(name, "removed storage adapter");
        }
        Ok(())
    }

    /// Shut down every registered adapter, keeping going past failures.
    pub async fn remove_all(&self) {
        let drained: Vec<_> = self.adapters.lock().await.drain().collect();
        for (name, adapter) in drained {
            if let Err(e) = adapter.disconnect().await {
                warn!(name = %name, error = %e, "adapter shutdown failed");
            }
        }
    }
}

async fn build_adapter(config: &AdapterConfig) -> Result<Arc<dyn EntityStore>> {
    match config.adapter_type {
        #[cfg(feature = "postgres")]
        crate::config::AdapterType::Postgres => Ok(Arc::new(
            crate::storage::PostgresEntityStore::connect(
                &config.postgres.uri,
                config.table.as_str(),
            )
            .await?,
        )),
        #[cfg(feature = "sqlite")]
        crate::config::AdapterType::Sqlite => Ok(Arc::new(
            crate::storage::SqliteEntityStore::open(&config.sqlite.path, config.table.as_str())
                .await?,
        )),
        #[cfg(not(all(feature = "postgres", feature = "sqlite")))]
        #[allow(unreachable_patterns)]
        other => Err(crate::interfaces::StorageError::Config(format!(
            "storage backend {:?} is not compiled in",
            other
        ))),
    }
}
