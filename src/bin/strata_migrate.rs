//! strata-migrate: operator CLI for schema migrations.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use strata::config::{AdapterType, Config, DATABASE_URL_ENV_VAR};
use strata::migrate::{
    MigrationDriver, MigrationRunner, MigrationSource, OutcomeStatus, RunReport,
};
use strata::utils::bootstrap::init_tracing;

#[derive(Parser)]
#[command(name = "strata-migrate", about = "Run schema migrations", version)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a timestamped migration stub.
    Create { name: String },
    /// Apply all pending migrations as one batch.
    Up,
    /// Roll back migrations from the latest batch.
    Down {
        /// Number of migrations to roll back.
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
    /// Show applied and pending migrations.
    Status,
    /// Roll back every applied migration.
    Reset,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    let source = MigrationSource::new(config.migrations.dir.as_str());

    // Create needs no database at all.
    if let Command::Create { name } = &cli.command {
        let path = source.create_stub(name)?;
        println!("created {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let runner = MigrationRunner::new(build_driver(&config).await?, source);
    runner.initialize().await?;

    match cli.command {
        Command::Create { .. } => unreachable!("handled above"),
        Command::Up => {
            let report = runner.up().await?;
            if report.outcomes.is_empty() {
                println!("no pending migrations");
            }
            Ok(print_report(&report))
        }
        Command::Down { steps } => {
            let report = runner.down(steps).await?;
            if report.outcomes.is_empty() {
                println!("nothing to roll back");
            }
            Ok(print_report(&report))
        }
        Command::Reset => {
            let report = runner.reset().await?;
            if report.outcomes.is_empty() {
                println!("nothing to roll back");
            }
            Ok(print_report(&report))
        }
        Command::Status => {
            let status = runner.status().await?;
            for record in &status.applied {
                println!("applied  {} (batch {})", record.id, record.batch);
            }
            for unit in &status.pending {
                println!("pending  {}", unit.id);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_report(report: &RunReport) -> ExitCode {
    for outcome in &report.outcomes {
        match outcome.status {
            OutcomeStatus::Applied => {
                println!("applied  {} in {:?}", outcome.id, outcome.duration);
            }
            OutcomeStatus::RolledBack => {
                println!("reverted {} in {:?}", outcome.id, outcome.duration);
            }
            OutcomeStatus::Failed => {
                eprintln!(
                    "failed   {}: {}",
                    outcome.id,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Pick the driver from config, with `DATABASE_URL` taking precedence.
async fn build_driver(
    config: &Config,
) -> Result<Box<dyn MigrationDriver>, Box<dyn std::error::Error>> {
    if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
        return driver_for_url(&url).await;
    }

    match config.storage.adapter_type {
        #[cfg(feature = "postgres")]
        AdapterType::Postgres => Ok(Box::new(
            strata::migrate::PostgresMigrationDriver::connect(&config.storage.postgres.uri)
                .await?,
        )),
        #[cfg(feature = "sqlite")]
        AdapterType::Sqlite => Ok(Box::new(
            strata::migrate::SqliteMigrationDriver::open(&config.storage.sqlite.path).await?,
        )),
        #[cfg(not(all(feature = "postgres", feature = "sqlite")))]
        #[allow(unreachable_patterns)]
        other => Err(format!("storage backend {other:?} is not compiled in").into()),
    }
}

#[allow(unused_variables)]
async fn driver_for_url(
    url: &str,
) -> Result<Box<dyn MigrationDriver>, Box<dyn std::error::Error>> {
    #[cfg(feature = "postgres")]
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Box::new(
            strata::migrate::PostgresMigrationDriver::connect(url).await?,
        ));
    }

    #[cfg(feature = "sqlite")]
    {
        let path = url.strip_prefix("sqlite:").unwrap_or(url);
        return Ok(Box::new(
            strata::migrate::SqliteMigrationDriver::open(path).await?,
        ));
    }

    #[allow(unreachable_code)]
    Err(format!("no storage backend compiled in for {url}").into())
}
