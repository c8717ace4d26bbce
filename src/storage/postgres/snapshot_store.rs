//! PostgreSQL SnapshotStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;

use crate::interfaces::{Result, Snapshot, SnapshotStore, StorageError};
use crate::storage::helpers::json_value;
use crate::storage::schema::{self, Snapshots};

/// PostgreSQL implementation of SnapshotStore.
pub struct PostgresSnapshotStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PostgresSnapshotStore {
    /// Create a new PostgreSQL snapshot store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::raw_sql(schema::CREATE_SNAPSHOTS_TABLE_POSTGRES)
                    .execute(&self.pool)
                    .await?;
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn get(&self, stream_id: &str) -> Result<Option<Snapshot>> {
        self.ensure_schema().await?;

        let (sql, values) = Query::select()
            .columns([Snapshots::Version, Snapshots::State, Snapshots::Timestamp])
            .from(Snapshots::Table)
            .and_where(Expr::col(Snapshots::StreamId).eq(stream_id))
            .build_sqlx(PostgresQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let state: JsonValue = row.try_get("state")?;
                Ok(Some(Snapshot {
                    version: row.try_get("version")?,
                    state,
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
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(())
    }

    async fn delete(&self, stream_id: &str) -> Result<()> {
        self.ensure_schema().await?;

        let (sql, values) = Query::delete()
            .from_table(Snapshots::Table)
            .and_where(Expr::col(Snapshots::StreamId).eq(stream_id))
            .build_sqlx(PostgresQueryBuilder);

        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(())
    }
}
