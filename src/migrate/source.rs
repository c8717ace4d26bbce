//! Migration unit discovery.
//!
//! A migration unit is a single `.sql` file named `<timestamp>_<name>.sql`
//! containing a `-- strata:up` section and a `-- strata:down` section.
//! The file stem is the unit's identifier and must stay stable once the
//! unit has been applied anywhere.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::interfaces::{Result, StorageError};

/// Marker opening the forward section of a migration file.
pub const UP_MARKER: &str = "-- strata:up";
/// Marker opening the rollback section of a migration file.
pub const DOWN_MARKER: &str = "-- strata:down";

/// A discovered migration unit.
#[derive(Debug, Clone)]
pub struct MigrationUnit {
    /// File stem; unique identifier for the unit.
    pub id: String,
    /// Human-readable name from the file stem.
    pub name: String,
    /// Ordering key parsed from the file name. Discovery order is never
    /// authoritative.
    pub timestamp: i64,
    /// Forward DDL/DML.
    pub up_sql: String,
    /// Rollback DDL/DML.
    pub down_sql: String,
}

/// Directory-backed source of migration units.
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scan the directory and return units sorted by timestamp.
    ///
    /// Files that do not match the expected shape are reported and
    /// skipped, so one stray file cannot wedge an entire deployment.
    /// A missing directory yields an empty list.
    pub fn discover(&self) -> Result<Vec<MigrationUnit>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "migrations directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut units = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            match parse_unit(&path) {
                Ok(unit) => units.push(unit),
                Err(reason) => {
                    warn!(file = %path.display(), %reason, "skipping invalid migration file");
                }
            }
        }

        units.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));

        Ok(units)
    }

    /// Write a timestamped stub for `name` and return its path.
    pub fn create_stub(&self, name: &str) -> Result<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(StorageError::Config(format!(
                "migration name {:?} has no usable characters",
                name
            )));
        }

        fs::create_dir_all(&self.dir)?;

        let timestamp = chrono::Utc::now().timestamp_millis();
        let path = self.dir.join(format!("{timestamp}_{slug}.sql"));
        fs::write(&path, format!("{UP_MARKER}\n\n\n{DOWN_MARKER}\n\n"))?;

        Ok(path)
    }
}

fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

fn parse_unit(path: &Path) -> std::result::Result<MigrationUnit, String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?;

    let (timestamp, name) = stem
        .split_once('_')
        .ok_or_else(|| "file name must be <timestamp>_<name>.sql".to_string())?;
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| "file name must start with a numeric timestamp".to_string())?;
    if name.is_empty() {
        return Err("migration name is empty".to_string());
    }

    let content = fs::read_to_string(path).map_err(|e| format!("unreadable: {e}"))?;

    let up_at = content
        .find(UP_MARKER)
        .ok_or_else(|| format!("missing {UP_MARKER:?} marker"))?;
    let down_at = content
        .find(DOWN_MARKER)
        .ok_or_else(|| format!("missing {DOWN_MARKER:?} marker"))?;
    if down_at < up_at {
        return Err("down section precedes up section".to_string());
    }

    let up_sql = content[up_at + UP_MARKER.len()..down_at].trim().to_string();
    let down_sql = content[down_at + DOWN_MARKER.len()..].trim().to_string();

    Ok(MigrationUnit {
        id: stem.to_string(),
        name: name.to_string(),
        timestamp,
        up_sql,
        down_sql,
    })
}
