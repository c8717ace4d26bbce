//! SQLite EntityStore implementation.
//!
//! Same contract as the PostgreSQL adapter over a local single-file engine.
//! The JSON document lives in a TEXT column; filters use `json_extract`
//! rather than a native JSON operator, with identical results.

use std::time::Duration;

use async_trait::async_trait;
use sea_query::{Alias, Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use serde_json::Value as JsonValue;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::OnceCell;
use tracing::warn;

use crate::interfaces::{EntityStore, EntityTransaction, Result, StorageError};
use crate::storage::helpers::{classify_filter, json_value, FilterPolicy};
use crate::storage::schema::{self, Entities};

use super::open_pool;

/// Default bound on pool shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite implementation of EntityStore.
pub struct SqliteEntityStore {
    pool: SqlitePool,
    table: String,
    shutdown_timeout: Duration,
    schema_ready: OnceCell<()>,
}

impl SqliteEntityStore {
    /// Create a store over an existing pool.
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            schema_ready: OnceCell::new(),
        }
    }

    /// Open the database file (creating it if missing) and create a store.
    pub async fn open(path: &str, table: impl Into<String>) -> Result<Self> {
        let pool = open_pool(path).await?;
        Ok(Self::new(pool, table))
    }

    /// Override the shutdown timeout applied by `disconnect`.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn table_ref(&self) -> Alias {
        Alias::new(self.table.as_str())
    }

    /// Provision table and trigger. Runs at most once per store instance.
    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::raw_sql(&schema::create_entities_sqlite(&self.table))
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
    E: sqlx::Executor<'e, Database = Sqlite>,
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
        .build_sqlx(SqliteQueryBuilder);

    sqlx::query_with(&sql, values).execute(executor).await?;
    Ok(())
}

async fn exec_load<'e, E>(executor: E, table: &str, key: &str) -> Result<Option<JsonValue>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (sql, values) = Query::select()
        .column(Entities::Data)
        .from(Alias::new(table))
        .and_where(Expr::col(Entities::Key).eq(key))
        .build_sqlx(SqliteQueryBuilder);

    let row = sqlx::query_with(&sql, values)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(row) => {
            let raw: String = row.try_get("data")?;
            Ok(Some(serde_json::from_str(&raw)?))
        }
        None => Ok(None),
    }
}

async fn exec_delete<'e, E>(executor: E, table: &str, key: &str) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (sql, values) = Query::delete()
        .from_table(Alias::new(table))
        .and_where(Expr::col(Entities::Key).eq(key))
        .build_sqlx(SqliteQueryBuilder);

    sqlx::query_with(&sql, values).execute(executor).await?;
    Ok(())
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
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
                // json_extract on both sides keeps the comparison typed:
                // numbers compare as numbers, strings as strings.
                for (field, expected) in fields {
                    let path = format!("$.{}", field);
                    if expected.is_null() {
                        // json_extract turns a JSON null into SQL NULL, which
                        // equality can never see; json_type distinguishes
                        // "present and null" from "absent".
                        stmt.and_where(Expr::cust_with_values(
                            "json_type(\"data\", ?) = 'null'",
                            [path],
                        ));
                    } else {
                        let raw = serde_json::to_string(expected)?;
                        stmt.and_where(Expr::cust_with_values(
                            "json_extract(\"data\", ?) = json_extract(?, '$')",
                            [path, raw],
                        ));
                    }
                }
            }
        }

        let (sql, values) = stmt.build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.try_get("data")?;
            documents.push(serde_json::from_str(&raw)?);
        }

        Ok(documents)
    }

    async fn begin(&self) -> Result<Box<dyn EntityTransaction>> {
        self.ensure_schema().await?;

        // The pool's single connection serializes writers; a deferred BEGIN
        // cannot deadlock against another pooled connection.
        let tx = self.pool.begin().await?;

        Ok(Box::new(SqliteEntityTransaction {
            tx,
            table: self.table.clone(),
        }))
    }

    async fn disconnect(&self) -> Result<()> {
        // Closing the pool closes the file handle and releases OS locks.
        if tokio::time::timeout(self.shutdown_timeout, self.pool.close())
            .await
            .is_err()
        {
            warn!(
                table = %self.table,
                "sqlite pool close timed out; abandoning remaining connections"
            );
        }
        Ok(())
    }
}

/// Transaction-scoped operations over the SQLite connection.
struct SqliteEntityTransaction {
    tx: Transaction<'static, Sqlite>,
    table: String,
}

#[async_trait]
impl EntityTransaction for SqliteEntityTransaction {
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
