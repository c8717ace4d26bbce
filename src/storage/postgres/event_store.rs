//! PostgreSQL EventStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;

use crate::interfaces::{EventMetadata, EventStore, NewEvent, RecordedEvent, Result, StorageError};
use crate::storage::helpers::{json_value, now_rfc3339};
use crate::storage::schema::{self, Events};

/// PostgreSQL implementation of EventStore.
pub struct PostgresEventStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PostgresEventStore {
    /// Create a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::raw_sql(schema::CREATE_EVENTS_TABLE_POSTGRES)
                    .execute(&self.pool)
                    .await?;
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    fn row_to_event(stream_id: &str, row: &sqlx::postgres::PgRow) -> Result<RecordedEvent> {
        let event_type: String = row.try_get("type")?;
        let data: JsonValue = row.try_get("data")?;
        let metadata: JsonValue = row.try_get("metadata")?;
        let metadata: EventMetadata = serde_json::from_value(metadata)?;

        Ok(RecordedEvent {
            stream_id: stream_id.to_string(),
            event_type,
            data,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, stream_id: &str, events: Vec<NewEvent>) -> Result<Vec<RecordedEvent>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;
        // Two concurrent appenders must not compute the same next version;
        // serializable plus the (stream_id, version) primary key guarantees it.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // Next version for the stream, read inside the same transaction.
        let base_version = {
            let (sql, values) = Query::select()
                .expr(Expr::col(Events::Version).max())
                .from(Events::Table)
                .and_where(Expr::col(Events::StreamId).eq(stream_id))
                .build_sqlx(PostgresQueryBuilder);

            let row = sqlx::query_with(&sql, values).fetch_optional(&mut *tx).await?;

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
                .build_sqlx(PostgresQueryBuilder);

            sqlx::query_with(&sql, values).execute(&mut *tx).await?;

            recorded.push(RecordedEvent {
                stream_id: stream_id.to_string(),
                event_type: event.event_type,
                data: event.data,
                metadata,
            });
        }

        tx.commit().await?;

        Ok(recorded)
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
            .build_sqlx(PostgresQueryBuilder);

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
            .build_sqlx(PostgresQueryBuilder);

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
