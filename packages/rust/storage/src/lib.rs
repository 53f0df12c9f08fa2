//! libSQL catalog store (local file mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the event catalog
//! and the ingestion run history.
//!
//! **Write contract:**
//! - one upsert per document, keyed on `(title_key, date_key)`; no transaction spans documents
//! - a constraint rejection fails only that document ([`SubmitReport::failed`])
//! - any other store error, or a write not acknowledged within the write
//!   timeout, is [`AgendaError::StoreUnavailable`] and aborts the caller's run

mod migrations;

use std::path::Path;
use std::time::Duration;

use agenda_shared::{AgendaError, EventDocument, IdentityKey, NormalizedEvent, Result};
use chrono::Utc;
use libsql::{Connection, Database, params};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Default per-write acknowledgement deadline.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_COLUMNS: &str = "doc_id, title_key, date_key, title, location, category, date, \
     end_date, link, image, source, highlighted, region, revision, first_seen_at, updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
    write_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Report / row types
// ---------------------------------------------------------------------------

/// Per-batch write outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmitReport {
    /// New identity keys.
    pub inserted: usize,
    /// Existing keys whose document changed.
    pub updated: usize,
    /// Existing keys resubmitted with identical content.
    pub unchanged: usize,
    /// Documents the store rejected: `(identity key, reason)`.
    pub failed: Vec<(String, String)>,
}

impl SubmitReport {
    /// Documents the store accepted (inserted, updated or already current).
    pub fn written(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// A catalog row.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    /// Document id (identity key digest).
    pub id: String,
    pub key: IdentityKey,
    pub document: EventDocument,
    /// 1 on first insert, bumped on every content change.
    pub revision: i64,
    pub first_seen_at: String,
    pub updated_at: String,
}

/// An ingestion run record.
#[derive(Debug, Clone)]
pub struct IngestRun {
    pub id: String,
    pub source: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AgendaError::io(parent, e))?;
        }

        let (db, conn) = connect(path).await?;
        let storage = Self {
            db,
            conn,
            readonly: false,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` for reading only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let (db, conn) = connect(path).await?;
        Ok(Self {
            db,
            conn,
            readonly: true,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    /// Override the per-write acknowledgement deadline.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    AgendaError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(AgendaError::StoreUnavailable(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event writes
    // -----------------------------------------------------------------------

    /// Upsert every event independently, in order.
    ///
    /// Returns `Err` only when the store is unavailable; per-document
    /// rejections are reported in [`SubmitReport::failed`].
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn submit(&self, events: &[NormalizedEvent]) -> Result<SubmitReport> {
        self.check_writable()?;
        let mut report = SubmitReport::default();

        for event in events {
            match self.upsert_event(event).await {
                Ok(Upsert::Inserted) => report.inserted += 1,
                Ok(Upsert::Updated) => report.updated += 1,
                Ok(Upsert::Unchanged) => report.unchanged += 1,
                Err(WriteError::Rejected(reason)) => {
                    warn!(key = %event.key, %reason, "document rejected by store");
                    report.failed.push((event.key.to_string(), reason));
                }
                Err(WriteError::Unavailable(reason)) => {
                    return Err(AgendaError::StoreUnavailable(reason));
                }
            }
        }

        debug!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "batch submitted"
        );
        Ok(report)
    }

    async fn upsert_event(&self, event: &NormalizedEvent) -> std::result::Result<Upsert, WriteError> {
        let doc = event.to_document();
        let hash = doc.content_hash();
        let doc_id = event.key.digest();
        let now = Utc::now().to_rfc3339();
        let highlighted = i64::from(doc.highlighted);

        let write = async {
            let mut rows = self
                .conn
                .query(
                    "INSERT INTO events (doc_id, title_key, date_key, title, location, category,
                        date, end_date, link, image, source, highlighted, region, content_hash,
                        revision, first_seen_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 1, ?15, ?15)
                     ON CONFLICT(title_key, date_key) DO UPDATE SET
                       title = excluded.title,
                       location = excluded.location,
                       category = excluded.category,
                       date = excluded.date,
                       end_date = excluded.end_date,
                       link = excluded.link,
                       image = excluded.image,
                       source = excluded.source,
                       highlighted = excluded.highlighted,
                       region = excluded.region,
                       content_hash = excluded.content_hash,
                       revision = events.revision + 1,
                       updated_at = excluded.updated_at
                     WHERE events.content_hash != excluded.content_hash
                     RETURNING revision",
                    params![
                        doc_id.as_str(),
                        event.key.title.as_str(),
                        event.key.date.as_str(),
                        doc.title.as_str(),
                        doc.location.as_deref(),
                        doc.category.as_str(),
                        doc.date.as_deref(),
                        doc.end_date.as_deref(),
                        doc.link.as_str(),
                        doc.image.as_deref(),
                        doc.source.as_str(),
                        highlighted,
                        doc.region.as_str(),
                        hash.as_str(),
                        now.as_str()
                    ],
                )
                .await?;
            let revision = match rows.next().await? {
                Some(row) => Some(row.get::<i64>(0)?),
                None => None,
            };
            Ok::<_, libsql::Error>(revision)
        };

        acknowledged(self.write_timeout, write).await
    }

    // -----------------------------------------------------------------------
    // Event reads
    // -----------------------------------------------------------------------

    /// Look up the row for an identity key.
    pub async fn get_event(&self, key: &IdentityKey) -> Result<Option<StoredEvent>> {
        let sql =
            format!("SELECT {EVENT_COLUMNS} FROM events WHERE title_key = ?1 AND date_key = ?2");
        let mut rows = self
            .conn
            .query(&sql, params![key.title.as_str(), key.date.as_str()])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_stored_event(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// List events, soonest first, undated last. Optionally restricted to one source.
    pub async fn list_events(&self, source: Option<&str>, limit: u32) -> Result<Vec<StoredEvent>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE ?1 IS NULL OR source = ?1
             ORDER BY date IS NULL, date, title_key
             LIMIT ?2"
        );
        let mut rows = self
            .conn
            .query(&sql, params![source, limit])
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_stored_event(&row)?);
        }
        Ok(results)
    }

    /// Number of catalog rows.
    pub async fn count_events(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM events", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).map(|n| n as u64).map_err(db_err),
            Ok(None) => Ok(0),
            Err(e) => Err(db_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Ingest run operations
    // -----------------------------------------------------------------------

    /// Record the start of an ingestion run. Returns the generated run ID.
    pub async fn insert_run(&self, source: Option<&str>) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_runs (id, source, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), source, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Close a run with its stats.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingest_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<IngestRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source, started_at, finished_at, stats_json FROM ingest_runs
                 ORDER BY id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(IngestRun {
                id: row.get::<String>(0).map_err(db_err)?,
                source: row.get::<String>(1).ok(),
                started_at: row.get::<String>(2).map_err(db_err)?,
                finished_at: row.get::<String>(3).ok(),
                stats_json: row.get::<String>(4).ok(),
            });
        }
        Ok(results)
    }
}

enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

enum WriteError {
    /// This document only.
    Rejected(String),
    /// The whole store.
    Unavailable(String),
}

async fn connect(path: &Path) -> Result<(Database, Connection)> {
    let db = libsql::Builder::new_local(path)
        .build()
        .await
        .map_err(|e| AgendaError::StoreUnavailable(e.to_string()))?;

    let conn = db
        .connect()
        .map_err(|e| AgendaError::StoreUnavailable(e.to_string()))?;
    Ok((db, conn))
}

fn db_err(e: libsql::Error) -> AgendaError {
    AgendaError::Storage(e.to_string())
}

/// Primary result code shared by every `SQLITE_CONSTRAINT_*` extended code.
const SQLITE_CONSTRAINT: i32 = 19;

/// UNIQUE / NOT NULL / CHECK failures, as opposed to I/O or locking errors.
fn is_constraint_violation(e: &libsql::Error) -> bool {
    matches!(e, libsql::Error::SqliteFailure(code, _) if code & 0xff == SQLITE_CONSTRAINT)
}

/// Await one upsert under `timeout` and classify its outcome.
async fn acknowledged<F>(timeout: Duration, write: F) -> std::result::Result<Upsert, WriteError>
where
    F: Future<Output = std::result::Result<Option<i64>, libsql::Error>>,
{
    match tokio::time::timeout(timeout, write).await {
        Err(_) => Err(WriteError::Unavailable(format!(
            "write not acknowledged within {}ms",
            timeout.as_millis()
        ))),
        Ok(Err(e)) if is_constraint_violation(&e) => Err(WriteError::Rejected(e.to_string())),
        Ok(Err(e)) => Err(WriteError::Unavailable(e.to_string())),
        Ok(Ok(Some(1))) => Ok(Upsert::Inserted),
        Ok(Ok(Some(_))) => Ok(Upsert::Updated),
        Ok(Ok(None)) => Ok(Upsert::Unchanged),
    }
}

/// Convert a row selected with [`EVENT_COLUMNS`].
fn row_to_stored_event(row: &libsql::Row) -> Result<StoredEvent> {
    let key = IdentityKey {
        title: row.get::<String>(1).map_err(db_err)?,
        date: row.get::<String>(2).map_err(db_err)?,
    };
    let document = EventDocument {
        title: row.get::<String>(3).map_err(db_err)?,
        location: row.get::<String>(4).ok(),
        category: row.get::<String>(5).map_err(db_err)?,
        date: row.get::<String>(6).ok(),
        end_date: row.get::<String>(7).ok(),
        link: row.get::<String>(8).map_err(db_err)?,
        image: row.get::<String>(9).ok(),
        source: row.get::<String>(10).map_err(db_err)?,
        highlighted: row.get::<i64>(11).map_err(db_err)? != 0,
        region: row.get::<String>(12).map_err(db_err)?,
    };
    Ok(StoredEvent {
        id: row.get::<String>(0).map_err(db_err)?,
        key,
        document,
        revision: row.get::<i64>(13).map_err(db_err)?,
        first_seen_at: row.get::<String>(14).map_err(db_err)?,
        updated_at: row.get::<String>(15).map_err(db_err)?,
    })
}
