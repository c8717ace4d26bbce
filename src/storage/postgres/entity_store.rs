//! PostgreSQL EntityStore implementation.
//!
//! Entities live in a configurable table with a JSONB `data` column. A
//! `BEFORE UPDATE` trigger refreshes `updated_at` on every row update.

use std::time::Duration;

use async_trait::async_trait;
use sea_query::{Alias, Expr, OnConflict, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::OnceCell;
use tracing::warn;

use crate::interfaces::{EntityStore, EntityTransaction, Result, StorageError};
use crate::storage::helpers::{classify_filter, json_value, FilterPolicy};
use crate::storage::schema::{self, Entities};

/// Default bound on pool shutdown, so a hung connection cannot block exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL implementation of EntityStore.
pub struct PostgresEntityStore {
    pool: PgPool,
    table: String,
    shutdown_timeout: Duration,
    schema_ready: OnceCell<()>,
}

impl PostgresEntityStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            schema_ready: OnceCell::new(),
        }
    }

    /// Connect to PostgreSQL and create a store.
    pub async fn connect(uri: &str, table: impl Into<String>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(uri)
            .await
            .map_err(StorageError::Connection)?;
        Ok(Self::new(pool, table))
    }

    /// Override the shutdown timeout applied by `disconnect`.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table_ref(&self) -> Alias {
        Alias::new(self.table.as_str())
    }

    /// Provision table and trigger. Runs at most once per store instance.
    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::raw_sql(&schema::create_entities_postgres(&self.table))
                    .execute(&self.pool)
                    .await?;
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }
}

async fn exec_save<'e, E>(executor: E, table: &str, key: &str, value: &JsonValue) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let (sql, values) = Query::insert()
        .into_table(Alias::new(table))
        .columns([Entities::Key, Entities::Data])
        .values_panic([key.into(), json_value(value).into()])
        .on_conflict(
            OnConflict::column(Entities::Key)
                .update_columns([Entities::Data])
                .to_owned(),
        )
        .build_sqlx(PostgresQueryBuilder);

    sqlx::query_with(&sql, values).execute(executor).await?;
    Ok(())
}

async fn exec_load<'e, E>(executor: E, table: &str, key: &str) -> Result<Option<JsonValue>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let (sql, values) = Query::select()
        .column(Entities::Data)
        .from(Alias::new(table))
        .and_where(Expr::col(Entities::Key).eq(key))
        .build_sqlx(PostgresQueryBuilder);

    let row = sqlx::query_with(&sql, values)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(row) => Ok(Some(row.try_get("data")?)),
        None => Ok(None),
    }
}

async fn exec_delete<'e, E>(executor: E, table: &str, key: &str) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let (sql, values) = Query::delete()
        .from_table(Alias::new(table))
        .and_where(Expr::col(Entities::Key).eq(key))
        .build_sqlx(PostgresQueryBuilder);

    sqlx::query_with(&sql, values).execute(executor).await?;
    Ok(())
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    async fn save(&self, key: &str, value: &JsonValue) -> Result<()> {
        self.ensure_schema().await?;
        exec_save(&self.pool, &self.table, key, value).await
    }

    async fn load(&self, key: &str) -> Result<Option<JsonValue>> {
        self.ensure_schema().await?;
        exec_load(&self.pool, &self.table, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_schema().await?;
        exec_delete(&self.pool, &self.table, key).await
    }

    async fn query(&self, filter: &JsonValue) -> Result<Vec<JsonValue>> {
        self.ensure_schema().await?;

        let mut stmt = Query::select()
            .column(Entities::Data)
            .from(self.table_ref())
            .order_by(Entities::Key, Order::Asc)
            .to_owned();

        match classify_filter(filter) {
            FilterPolicy::MatchNone => return Ok(Vec::new()),
            FilterPolicy::MatchAll => {}
            FilterPolicy::Fields(fields) => {
                // JSONB containment: a conjunction of top-level equality checks.
                stmt.and_where(Expr::cust_with_values(
                    r#""data" @> ?"#,
                    [json_value(&JsonValue::Object(fields.clone()))],
                ));
            }
        }

        let (sql, values) = stmt.build_sqlx(PostgresQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(row.try_get("data")?);
        }

        Ok(documents)
    }

    async fn begin(&self) -> Result<Box<dyn EntityTransaction>> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;
        // Serializable prevents write skew between concurrent multi-statement
        // sequences; weaker isolation here is a correctness bug.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PostgresEntityTransaction {
            tx,
            table: self.table.clone(),
        }))
    }

    async fn disconnect(&self) -> Result<()> {
        if tokio::time::timeout(self.shutdown_timeout, self.pool.close())
            .await
            .is_err()
        {
            warn!(
                table = %self.table,
                "postgres pool close timed out; abandoning remaining connections"
            );
        }
        Ok(())
    }
}

/// Transaction-scoped operations over a PostgreSQL connection.
struct PostgresEntityTransaction {
    tx: Transaction<'static, Postgres>,
    table: String,
}

#[async_trait]
impl EntityTransaction for PostgresEntityTransaction {
    async fn save(&mut self, key: &str, value: &JsonValue) -> Result<()> {
        exec_save(&mut *self.tx, &self.table, key, value).await
    }

    async fn load(&mut self, key: &str) -> Result<Option<JsonValue>> {
        exec_load(&mut *self.tx, &self.table, key).await
    }

    async fn delete(&mut self, key: &str) -> Result<()> {
        exec_delete(&mut *self.tx, &self.table, key).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
