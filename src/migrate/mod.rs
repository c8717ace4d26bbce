//! Schema migration runner.
//!
//! Discovers ordered migration units from a directory, tracks applied
//! records with batch numbers in a metadata table, and applies or rolls
//! back units one transaction at a time. A run stops at the first
//! failure; everything already completed stays recorded.

mod driver;
mod source;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::interfaces::{Result, StorageError};

pub use driver::MigrationDriver;
#[cfg(feature = "postgres")]
pub use driver::PostgresMigrationDriver;
#[cfg(feature = "sqlite")]
pub use driver::SqliteMigrationDriver;
pub use source::{MigrationSource, MigrationUnit, DOWN_MARKER, UP_MARKER};

/// A row in the migration metadata table.
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub id: String,
    pub name: String,
    pub timestamp: i64,
    /// RFC 3339 instant the unit was applied.
    pub applied_at: String,
    /// Run that applied the unit; rollback is batch-scoped.
    pub batch: i64,
}

/// Terminal state of one attempted migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Applied,
    RolledBack,
    Failed,
}

/// Result of one attempted migration within a run.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub id: String,
    pub name: String,
    pub status: OutcomeStatus,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Results of an `up`, `down` or `reset` run, one entry per attempt.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<MigrationOutcome>,
}

impl RunReport {
    /// True when no attempted migration failed.
    pub fn succeeded(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status != OutcomeStatus::Failed)
    }
}

/// Applied and pending migrations, computed without mutating anything.
#[derive(Debug)]
pub struct StatusReport {
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<MigrationUnit>,
}

/// Orchestrates migration runs over a driver and a source directory.
pub struct MigrationRunner {
    driver: Box<dyn MigrationDriver>,
    source: MigrationSource,
}

impl MigrationRunner {
    pub fn new(driver: Box<dyn MigrationDriver>, source: MigrationSource) -> Self {
        Self { driver, source }
    }

    /// Idempotently provision the metadata table.
    pub async fn initialize(&self) -> Result<()> {
        self.driver.ensure_table().await
    }

    /// Discovered units, sorted by timestamp ascending.
    pub fn load_migrations(&self) -> Result<Vec<MigrationUnit>> {
        self.source.discover()
    }

    /// Apply every pending unit in timestamp order as one new batch.
    ///
    /// Stops at the first failure; units applied before the failure stay
    /// applied and recorded.
    pub async fn up(&self) -> Result<RunReport> {
        self.driver.ensure_table().await?;

        let units = self.source.discover()?;
        let applied = self.driver.applied().await?;
        let applied_ids: HashSet<&str> = applied.iter().map(|r| r.id.as_str()).collect();
        let batch = applied.iter().map(|r| r.batch).max().unwrap_or(0) + 1;

        let mut report = RunReport::default();
        for unit in units.iter().filter(|u| !applied_ids.contains(u.id.as_str())) {
            let started = Instant::now();
            match self.driver.apply(unit, batch).await {
                Ok(()) => {
                    let duration = started.elapsed();
                    info!(id = %unit.id, ?duration, batch, "applied migration");
                    report.outcomes.push(MigrationOutcome {
                        id: unit.id.clone(),
                        name: unit.name.clone(),
                        status: OutcomeStatus::Applied,
                        duration,
                        error: None,
                    });
                }
                Err(e) => {
                    error!(id = %unit.id, error = %e, "migration failed, stopping run");
                    report.outcomes.push(MigrationOutcome {
                        id: unit.id.clone(),
                        name: unit.name.clone(),
                        status: OutcomeStatus::Failed,
                        duration: started.elapsed(),
                        error: Some(e.to_string()),
                    });
                    // Later units may depend on this one.
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Roll back up to `steps` units from the latest batch, newest first.
    ///
    /// Only the latest batch is eligible; earlier batches need further
    /// `down` calls once the latest batch is empty.
    pub async fn down(&self, steps: usize) -> Result<RunReport> {
        self.driver.ensure_table().await?;

        let applied = self.driver.applied().await?;
        let Some(latest_batch) = applied.iter().map(|r| r.batch).max() else {
            return Ok(RunReport::default());
        };

        let batch_records: Vec<&MigrationRecord> = applied
            .iter()
            .filter(|r| r.batch == latest_batch)
            .collect();
        let take = steps.min(batch_records.len());
        let targets = &batch_records[batch_records.len() - take..];

        self.revert_records(targets.iter().rev().copied()).await
    }

    /// Roll back every applied unit, newest first, across all batches.
    pub async fn reset(&self) -> Result<RunReport> {
        self.driver.ensure_table().await?;

        let applied = self.driver.applied().await?;
        self.revert_records(applied.iter().rev()).await
    }

    /// Report applied and pending migrations.
    pub async fn status(&self) -> Result<StatusReport> {
        self.driver.ensure_table().await?;

        let units = self.source.discover()?;
        let applied = self.driver.applied().await?;

        let pending = {
            let applied_ids: HashSet<&str> = applied.iter().map(|r| r.id.as_str()).collect();
            units
                .into_iter()
                .filter(|u| !applied_ids.contains(u.id.as_str()))
                .collect()
        };

        Ok(StatusReport { applied, pending })
    }

    async fn revert_records<'a, I>(&self, records: I) -> Result<RunReport>
    where
        I: Iterator<Item = &'a MigrationRecord>,
    {
        let units: HashMap<String, MigrationUnit> = self
            .source
            .discover()?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut report = RunReport::default();
        for record in records {
            let started = Instant::now();

            let result = match units.get(&record.id) {
                Some(unit) => self.driver.revert(&record.id, &unit.down_sql).await,
                // The applied record outlived its file; rolling back blind
                // is not an option.
                None => Err(StorageError::Config(format!(
                    "no migration file found for applied migration {}",
                    record.id
                ))),
            };

            match result {
                Ok(()) => {
                    let duration = started.elapsed();
                    info!(id = %record.id, ?duration, "rolled back migration");
                    report.outcomes.push(MigrationOutcome {
                        id: record.id.clone(),
                        name: record.name.clone(),
                        status: OutcomeStatus::RolledBack,
                        duration,
                        error: None,
                    });
                }
                Err(e) => {
                    error!(id = %record.id, error = %e, "rollback failed, stopping run");
                    report.outcomes.push(MigrationOutcome {
                        id: record.id.clone(),
                        name: record.name.clone(),
                        status: OutcomeStatus::Failed,
                        duration: started.elapsed(),
                        error: Some(e.to_string()),
                    });
                    break;
                }
            }
        }

        Ok(report)
    }
}
