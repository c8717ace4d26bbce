//! Migration drivers.
//!
//! A driver owns the backend-specific half of the runner: provisioning
//! the metadata table, listing applied records, and executing one unit's
//! script plus its bookkeeping inside a single transaction.

use async_trait::async_trait;

use crate::interfaces::Result;

use super::{MigrationRecord, MigrationUnit};

/// Backend persistence for the migration runner.
#[async_trait]
pub trait MigrationDriver: Send + Sync {
    /// Idempotently provision the migration metadata table.
    async fn ensure_table(&self) -> Result<()>;

    /// All applied records, ordered by batch then timestamp.
    async fn applied(&self) -> Result<Vec<MigrationRecord>>;

    /// Run a unit's up script and record it, atomically. A failed script
    /// leaves no record behind.
    async fn apply(&self, unit: &MigrationUnit, batch: i64) -> Result<()>;

    /// Run a down script and delete the unit's record, atomically.
    async fn revert(&self, id: &str, down_sql: &str) -> Result<()>;
}

macro_rules! impl_migration_driver {
    ($name:ident, $pool:ty, $builder:expr, $feature:literal) => {
        #[cfg(feature = $feature)]
        pub struct $name {
            pool: $pool,
        }

        #[cfg(feature = $feature)]
        impl $name {
            pub fn new(pool: $pool) -> Self {
                Self { pool }
            }

            /// Get the underlying pool.
            pub fn pool(&self) -> &$pool {
                &self.pool
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl MigrationDriver for $name {
            async fn ensure_table(&self) -> Result<()> {
                // Executor::execute pins the database type through the
                // receiver; RawSql's own execute is too generic for the
                // boxed trait-method future to stay Send.
                sqlx::Executor::execute(
                    &self.pool,
                    sqlx::raw_sql(crate::storage::schema::CREATE_MIGRATIONS_TABLE),
                )
                .await?;
                Ok(())
            }

            async fn applied(&self) -> Result<Vec<MigrationRecord>> {
                use sea_query::{Order, Query};
                use sea_query_binder::SqlxBinder;
                use sqlx::Row;

                use crate::storage::schema::Migrations;

                let (sql, values) = Query::select()
                    .columns([
                        Migrations::Id,
                        Migrations::Name,
                        Migrations::Timestamp,
                        Migrations::AppliedAt,
                        Migrations::Batch,
                    ])
                    .from(Migrations::Table)
                    .order_by(Migrations::Batch, Order::Asc)
                    .order_by(Migrations::Timestamp, Order::Asc)
                    .build_sqlx($builder);

                let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

                let mut records = Vec::with_capacity(rows.len());
                for row in rows {
                    records.push(MigrationRecord {
                        id: row.try_get("id")?,
                        name: row.try_get("name")?,
                        timestamp: row.try_get("timestamp")?,
                        applied_at: row.try_get("applied_at")?,
                        batch: row.try_get("batch")?,
                    });
                }

                Ok(records)
            }

            async fn apply(&self, unit: &MigrationUnit, batch: i64) -> Result<()> {
                use sea_query::Query;
                use sea_query_binder::SqlxBinder;

                use crate::interfaces::StorageError;
                use crate::storage::helpers::now_rfc3339;
                use crate::storage::schema::Migrations;

                // Dropping the transaction on an early return rolls it back,
                // so a failed script never leaves a record behind.
                let mut tx = self.pool.begin().await?;

                if !unit.up_sql.trim().is_empty() {
                    sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&unit.up_sql))
                        .await
                        .map_err(|e| StorageError::Migration {
                            id: unit.id.clone(),
                            source: Box::new(e.into()),
                        })?;
                }

                let (sql, values) = Query::insert()
                    .into_table(Migrations::Table)
                    .columns([
                        Migrations::Id,
                        Migrations::Name,
                        Migrations::Timestamp,
                        Migrations::AppliedAt,
                        Migrations::Batch,
                    ])
                    .values_panic([
                        unit.id.as_str().into(),
                        unit.name.as_str().into(),
                        unit.timestamp.into(),
                        now_rfc3339().into(),
                        batch.into(),
                    ])
                    .build_sqlx($builder);

                sqlx::query_with(&sql, values).execute(&mut *tx).await?;
                tx.commit().await?;

                Ok(())
            }

            async fn revert(&self, id: &str, down_sql: &str) -> Result<()> {
                use sea_query::{Expr, Query};
                use sea_query_binder::SqlxBinder;

                use crate::interfaces::StorageError;
                use crate::storage::schema::Migrations;

                let mut tx = self.pool.begin().await?;

                if !down_sql.trim().is_empty() {
                    sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(down_sql))
                        .await
                        .map_err(|e| StorageError::Migration {
                            id: id.to_string(),
                            source: Box::new(e.into()),
                        })?;
                }

                let (sql, values) = Query::delete()
                    .from_table(Migrations::Table)
                    .and_where(Expr::col(Migrations::Id).eq(id))
                    .build_sqlx($builder);

                sqlx::query_with(&sql, values).execute(&mut *tx).await?;
                tx.commit().await?;

                Ok(())
            }
        }
    };
}

impl_migration_driver!(
    PostgresMigrationDriver,
    sqlx::PgPool,
    sea_query::PostgresQueryBuilder,
    "postgres"
);
impl_migration_driver!(
    SqliteMigrationDriver,
    sqlx::SqlitePool,
    sea_query::SqliteQueryBuilder,
    "sqlite"
);

#[cfg(feature = "postgres")]
impl PostgresMigrationDriver {
    /// Connect to PostgreSQL and create a driver.
    pub async fn connect(uri: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(uri)
            .await
            .map_err(crate::interfaces::StorageError::Connection)?;
        Ok(Self::new(pool))
    }
}

#[cfg(feature = "sqlite")]
impl SqliteMigrationDriver {
    /// Open the database file (creating it if missing) and create a driver.
    pub async fn open(path: &str) -> Result<Self> {
        Ok(Self::new(crate::storage::sqlite::open_pool(path).await?))
    }
}
