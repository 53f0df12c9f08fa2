//! SQL migration definitions for the Agenda catalog.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: events, ingest_runs",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Event catalog, one row per identity key.
-- date_key is '' for undated events so the pair stays comparable.
CREATE TABLE IF NOT EXISTS events (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id        TEXT NOT NULL,
    title_key     TEXT NOT NULL,
    date_key      TEXT NOT NULL,
    title         TEXT NOT NULL,
    location      TEXT,
    category      TEXT NOT NULL,
    date          TEXT,
    end_date      TEXT,
    link          TEXT NOT NULL,
    image         TEXT,
    source        TEXT NOT NULL,
    highlighted   INTEGER NOT NULL DEFAULT 0,
    region        TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    revision      INTEGER NOT NULL DEFAULT 1,
    first_seen_at TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE(title_key, date_key)
);

CREATE INDEX IF NOT EXISTS idx_events_doc_id ON events(doc_id);
CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
CREATE INDEX IF NOT EXISTS idx_events_source ON events(source);
CREATE INDEX IF NOT EXISTS idx_events_category ON events(category);

-- Ingestion run history
CREATE TABLE IF NOT EXISTS ingest_runs (
    id          TEXT PRIMARY KEY,
    source      TEXT,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
