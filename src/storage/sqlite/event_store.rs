//! SQLite EventStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::OnceCell;
use tracing::warn;

use crate::interfaces::{EventMetadata, EventStore, NewEvent, RecordedEvent, Result, StorageError};
use crate::storage::helpers::{json_value, now_rfc3339};
use crate::storage::schema::{self, Events};

/// SQLite implementation of EventStore.
pub struct SqliteEventStore {
    pool: SqlitePool,
    schema_ready: OnceCell<()>,
}

impl SqliteEventStore {
    /// Create a new SQLite event store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::raw_sql(schema::CREATE_EVENTS_TABLE_SQLITE)
                    .execute(&self.pool)
                    .await?;
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    /// Insert events within an already-started transaction.
    async fn insert_events(
        conn: &mut SqliteConnection,
        stream_id: &str,
        events: Vec<NewEvent>,
    ) -> Result<Vec<RecordedEvent>> {
        let base_version = {
            let (sql, values) = Query::select()
                .expr(Expr::col(Events::Version).max())
                .from(Events::Table)
                .and_where(Expr::col(Events::StreamId).eq(stream_id))
                .build_sqlx(SqliteQueryBuilder);

            let row = sqlx::query_with(&sql, values)
                .fetch_optional(&mut *conn)
                .await?;

            match row {
                Some(row) => {
                    let max_version: Option<i64> = row.try_get(0)?;
                    max_version.map(|v| v + 1).unwrap_or(0)
                }
                None => 0,
            }
        };

        let mut recorded = Vec::with_capacity(events.len());

        for (offset, event) in events.into_iter().enumerate() {
            let metadata = EventMetadata {
                version: base_version + offset as i64,
                timestamp: now_rfc3339(),
                user_id: event.user_id,
            };
            let metadata_json = serde_json::to_value(&metadata)?;

            let (sql, values) = Query::insert()
                .into_table(Events::Table)
                .columns([
                    Events::StreamId,
                    Events::Version,
                    Events::Type,
                    Events::Data,
                    Events::Metadata,
                ])
                .values_panic([
                    stream_id.into(),
                    metadata.version.into(),
                    event.event_type.as_str().into(),
                    json_value(&event.data).into(),
                    json_value(&metadata_json).into(),
                ])
                .build_sqlx(SqliteQueryBuilder);

            sqlx::query_with(&sql, values).execute(&mut *conn).await?;

            recorded.push(RecordedEvent {
                stream_id: stream_id.to_string(),
                event_type: event.event_type,
                data: event.data,
                metadata,
            });
        }

        Ok(recorded)
    }

    /// Roll back an open transaction, logging rather than masking a
    /// cleanup failure so the original error still reaches the caller.
    async fn rollback(conn: &mut SqliteConnection, stream_id: &str) {
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            warn!(stream_id, error = %e, "rollback after failed append failed");
        }
    }

    fn row_to_event(stream_id: &str, row: &sqlx::sqlite::SqliteRow) -> Result<RecordedEvent> {
        let event_type: String = row.try_get("type")?;
        let data: String = row.try_get("data")?;
        let metadata: String = row.try_get("metadata")?;

        Ok(RecordedEvent {
            stream_id: stream_id.to_string(),
            event_type,
            data: serde_json::from_str(&data)?,
            metadata: serde_json::from_str(&metadata)?,
        })
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append(&self, stream_id: &str, events: Vec<NewEvent>) -> Result<Vec<RecordedEvent>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_schema().await?;

        // BEGIN IMMEDIATE acquires the write lock upfront, preventing
        // deadlocks when concurrent DEFERRED transactions race to upgrade
        // from shared to exclusive.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::insert_events(&mut conn, stream_id, events).await;

        match result {
            Ok(recorded) => match sqlx::query("COMMIT").execute(&mut *conn).await {
                Ok(_) => Ok(recorded),
                Err(e) => {
                    // The connection goes back to the pool; it must not
                    // stay inside a failed transaction.
                    Self::rollback(&mut conn, stream_id).await;
                    Err(e.into())
                }
            },
            Err(e) => {
                Self::rollback(&mut conn, stream_id).await;
                Err(e)
            }
        }
    }

    async fn read(&self, stream_id: &str) -> Result<Vec<RecordedEvent>> {
        self.read_from(stream_id, 0).await
    }

    async fn read_from(&self, stream_id: &str, from_version: i64) -> Result<Vec<RecordedEvent>> {
        self.ensure_schema().await?;

        let (sql, values) = Query::select()
            .columns([Events::Type, Events::Data, Events::Metadata])
            .from(Events::Table)
            .and_where(Expr::col(Events::StreamId).eq(stream_id))
            .and_where(Expr::col(Events::Version).gte(from_version))
            .order_by(Events::Version, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(Self::row_to_event(stream_id, &row)?);
        }

        Ok(events)
    }

    async fn next_version(&self, stream_id: &str) -> Result<i64> {
        self.ensure_schema().await?;

        let (sql, values) = Query::select()
            .expr(Expr::col(Events::Version).max())
            .from(Events::Table)
            .and_where(Expr::col(Events::StreamId).eq(stream_id))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let max_version: Option<i64> = row.try_get(0)?;
                Ok(max_version.map(|v| v + 1).unwrap_or(0))
            }
            None => Ok(0),
        }
    }
}
