//! Application configuration.
//!
//! Configuration is layered: defaults, then an optional YAML file, then
//! STRATA-prefixed environment variables. Nested keys use `__` as the
//! separator, e.g. `STRATA_STORAGE__TYPE=postgres`.

mod storage;

use serde::Deserialize;

pub use storage::{AdapterConfig, AdapterType, PostgresConfig, SqliteConfig};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "STRATA_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "STRATA";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "STRATA_LOG";
/// Environment variable overriding the configured database location.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

/// Migration runner configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory scanned for migration files.
    pub dir: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dir: "migrations".to_string(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: AdapterConfig,
    pub migrations: MigrationConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Sources, later ones overriding earlier:
    /// 1. `config.yaml` in the working directory, if present
    /// 2. the file named by `path`, if given
    /// 3. the file named by `STRATA_CONFIG`, if set
    /// 4. `STRATA`-prefixed environment variables
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLoader, Environment, File, FileFormat};

        let mut builder = ConfigLoader::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let loaded = builder
            .add_source(Environment::with_prefix(CONFIG_ENV_PREFIX).separator("__"))
            .build()?;

        Ok(loaded.try_deserialize()?)
    }
}
