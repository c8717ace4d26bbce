//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query
//! building, plus the DDL each backend runs when provisioning lazily.
//! Entity table names are adapter configuration and treated as trusted
//! identifiers; all other tables have fixed names.

use sea_query::Iden;

/// Entity table columns. The table name itself is adapter configuration.
#[derive(Iden)]
pub enum Entities {
    #[iden = "key"]
    Key,
    #[iden = "data"]
    Data,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Events table schema.
#[derive(Iden)]
pub enum Events {
    Table,
    #[iden = "stream_id"]
    StreamId,
    #[iden = "version"]
    Version,
    #[iden = "type"]
    Type,
    #[iden = "data"]
    Data,
    #[iden = "metadata"]
    Metadata,
}

/// Snapshots table schema.
#[derive(Iden)]
pub enum Snapshots {
    Table,
    #[iden = "stream_id"]
    StreamId,
    #[iden = "version"]
    Version,
    #[iden = "state"]
    State,
    #[iden = "timestamp"]
    Timestamp,
}

/// Migration metadata table schema.
#[derive(Iden)]
pub enum Migrations {
    #[iden = "strata_migrations"]
    Table,
    #[iden = "id"]
    Id,
    #[iden = "name"]
    Name,
    #[iden = "timestamp"]
    Timestamp,
    #[iden = "applied_at"]
    AppliedAt,
    #[iden = "batch"]
    Batch,
}

/// SQL for creating the migration metadata table. Valid on both backends.
pub const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS strata_migrations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    timestamp BIGINT NOT NULL,
    applied_at TEXT NOT NULL,
    batch BIGINT NOT NULL
);
"#;

/// DDL for an entity table plus its updated_at trigger (SQLite).
#[cfg(feature = "sqlite")]
pub fn create_entities_sqlite(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    "key" TEXT PRIMARY KEY,
    "data" TEXT NOT NULL,
    "created_at" TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    "updated_at" TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TRIGGER IF NOT EXISTS "{table}_touch_updated_at"
AFTER UPDATE ON "{table}"
FOR EACH ROW
BEGIN
    UPDATE "{table}" SET "updated_at" = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
    WHERE "key" = NEW."key";
END;
"#
    )
}

/// DDL for an entity table plus its updated_at trigger (PostgreSQL).
#[cfg(feature = "postgres")]
pub fn create_entities_postgres(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    "key" TEXT PRIMARY KEY,
    "data" JSONB NOT NULL,
    "created_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
    "updated_at" TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE OR REPLACE FUNCTION "{table}_touch_updated_at"() RETURNS trigger AS $$
BEGIN
    NEW."updated_at" = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS "{table}_touch_updated_at" ON "{table}";
CREATE TRIGGER "{table}_touch_updated_at"
BEFORE UPDATE ON "{table}"
FOR EACH ROW EXECUTE FUNCTION "{table}_touch_updated_at"();
"#
    )
}

/// SQL for creating the events table (SQLite).
#[cfg(feature = "sqlite")]
pub const CREATE_EVENTS_TABLE_SQLITE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    stream_id TEXT NOT NULL,
    version BIGINT NOT NULL,
    "type" TEXT NOT NULL,
    data TEXT NOT NULL,
    metadata TEXT NOT NULL,
    PRIMARY KEY (stream_id, version)
);

CREATE INDEX IF NOT EXISTS idx_events_stream ON events(stream_id);
"#;

/// SQL for creating the events table (PostgreSQL).
///
/// The primary key doubles as the UNIQUE(stream_id, version) guard against
/// concurrent appenders sharing a version.
#[cfg(feature = "postgres")]
pub const CREATE_EVENTS_TABLE_POSTGRES: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    stream_id TEXT NOT NULL,
    version BIGINT NOT NULL,
    "type" TEXT NOT NULL,
    data JSONB NOT NULL,
    metadata JSONB NOT NULL,
    PRIMARY KEY (stream_id, version)
);

CREATE INDEX IF NOT EXISTS idx_events_stream ON events(stream_id);
"#;

/// SQL for creating the snapshots table (SQLite).
#[cfg(feature = "sqlite")]
pub const CREATE_SNAPSHOTS_TABLE_SQLITE: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    stream_id TEXT PRIMARY KEY,
    version BIGINT NOT NULL,
    state TEXT NOT NULL,
    "timestamp" TEXT NOT NULL
);
"#;

/// SQL for creating the snapshots table (PostgreSQL).
#[cfg(feature = "postgres")]
pub const CREATE_SNAPSHOTS_TABLE_POSTGRES: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    stream_id TEXT PRIMARY KEY,
    version BIGINT NOT NULL,
    state JSONB NOT NULL,
    "timestamp" TEXT NOT NULL
);
"#;
