//! SQLite SnapshotStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::{Row, SqlitePool};
use tokio::sync::OnceCell;

use crate::interfaces::{Result, Snapshot, SnapshotStore, StorageError};
use crate::storage::helpers::json_value;
use crate::storage::schema::{self, Snapshots};

/// SQLite implementation of SnapshotStore.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
    schema_ready: OnceCell<()>,
}

impl SqliteSnapshotStore {
    /// Create a new SQLite snapshot store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::raw_sql(schema::CREATE_SNAPSHOTS_TABLE_SQLITE)
                    .execute(&self.pool)
                    .await?;
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, stream_id: &str) -> Result<Option<Snapshot>> {
        self.ensure_schema().await?;

        let (sql, values) = Query::select()
            .columns([Snapshots::Version, Snapshots::State, Snapshots::Timestamp])
            .from(Snapshots::Table)
            .and_where(Expr::col(Snapshots::StreamId).eq(stream_id))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let state: String = row.try_get("state")?;
                Ok(Some(Snapshot {
                    version: row.try_get("version")?,
                    state: serde_json::from_str(&state)?,
                    timestamp: row.try_get("timestamp")?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, stream_id: &str, snapshot: Snapshot) -> Result<()> {
        self.ensure_schema().await?;

        let (sql, values) = Query::insert()
            .into_table(Snapshots::Table)
            .columns([
                Snapshots::StreamId,
                Snapshots::Version,
                Snapshots::State,
                Snapshots::Timestamp,
            ])
            .values_panic([
                stream_id.into(),
                snapshot.version.into(),
                json_value(&snapshot.state).into(),
                snapshot.timestamp.as_str().into(),
            ])
            .on_conflict(
                OnConflict::column(Snapshots::StreamId)
                    .update_columns([Snapshots::Version, Snapshots::State, Snapshots::Timestamp])
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(())
    }

    async fn delete(&self, stream_id: &str) -> Result<()> {
        self.ensure_schema().await?;

        let (sql, values) = Query::delete()
            .from_table(Snapshots::Table)
            .and_where(Expr::col(Snapshots::StreamId).eq(stream_id))
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(())
    }
}
