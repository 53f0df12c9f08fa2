//! Ingestion run: sources → normalize → categorize → filter → dedup → store.
//!
//! Sources are processed one after another and every store write is awaited
//! before the next. Each raw record ends with exactly one [`RecordOutcome`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use agenda_dates::{DateNormalizer, DateParseError};
use agenda_shared::{
    AgendaError, AppConfig, IdentityKey, Notation, NormalizedEvent, RawEventRecord, Result,
    SourceConfig,
};
use agenda_sources::{SourceAdapter, SourceRegistry};
use agenda_storage::{Storage, SubmitReport};

use crate::categorize::Categorizer;
use crate::identity::{dedup_batch, key_for};

// ---------------------------------------------------------------------------
// Per-record outcome
// ---------------------------------------------------------------------------

/// Why a raw record produced no document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Title empty after trimming.
    MissingTitle,
    /// Date text present but not resolvable in the source's notation.
    DateParse { raw: String, error: DateParseError },
    /// Terminal instant before the run's clock.
    Stale { terminal: NaiveDateTime },
    /// Another record of the same batch already has this key.
    Duplicate { key: IdentityKey },
}

impl DropReason {
    /// Short tag used in counts and run stats.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingTitle => "missing-title",
            Self::DateParse { .. } => "date-parse",
            Self::Stale { .. } => "stale",
            Self::Duplicate { .. } => "duplicate",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "missing title"),
            Self::DateParse { raw, error } => write!(f, "unparseable date '{raw}': {error}"),
            Self::Stale { terminal } => write!(f, "ended at {terminal}"),
            Self::Duplicate { key } => write!(f, "duplicate of {key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Normalized and handed to the store.
    Accepted { key: IdentityKey },
    Dropped { title: String, reason: DropReason },
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of ingesting one source.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    /// Raw records returned by the adapter.
    pub fetched: usize,
    /// Set when the adapter failed; the batch was then empty.
    pub fetch_error: Option<String>,
    pub outcomes: Vec<RecordOutcome>,
    pub submit: SubmitReport,
}

impl SourceReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            fetched: 0,
            fetch_error: None,
            outcomes: Vec::new(),
            submit: SubmitReport::default(),
        }
    }

    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Accepted { .. }))
            .count()
    }

    /// Dropped records with their reasons.
    pub fn dropped(&self) -> impl Iterator<Item = (&str, &DropReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            RecordOutcome::Dropped { title, reason } => Some((title.as_str(), reason)),
            RecordOutcome::Accepted { .. } => None,
        })
    }

    /// Dropped records per [`DropReason::kind`].
    pub fn drop_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for (_, reason) in self.dropped() {
            *counts.entry(reason.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// Result of one ingestion run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub sources: Vec<SourceReport>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn fetched(&self) -> usize {
        self.sources.iter().map(|s| s.fetched).sum()
    }

    pub fn accepted(&self) -> usize {
        self.sources.iter().map(SourceReport::accepted).sum()
    }

    pub fn dropped(&self) -> usize {
        self.sources.iter().map(|s| s.dropped().count()).sum()
    }

    pub fn inserted(&self) -> usize {
        self.sources.iter().map(|s| s.submit.inserted).sum()
    }

    pub fn updated(&self) -> usize {
        self.sources.iter().map(|s| s.submit.updated).sum()
    }

    pub fn unchanged(&self) -> usize {
        self.sources.iter().map(|s| s.submit.unchanged).sum()
    }

    pub fn failed(&self) -> usize {
        self.sources.iter().map(|s| s.submit.failed.len()).sum()
    }

    /// Stats persisted with the run record.
    pub fn stats_json(&self) -> String {
        let per_source: Vec<serde_json::Value> = self
            .sources
            .iter()
            .map(|s| {
                serde_json::json!({
                    "source": s.source,
                    "fetched": s.fetched,
                    "fetch_error": s.fetch_error,
                    "accepted": s.accepted(),
                    "dropped": s.drop_counts(),
                    "submit": s.submit,
                })
            })
            .collect();

        serde_json::json!({
            "fetched": self.fetched(),
            "accepted": self.accepted(),
            "dropped": self.dropped(),
            "inserted": self.inserted(),
            "updated": self.updated(),
            "unchanged": self.unchanged(),
            "failed": self.failed(),
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "sources": per_source,
        })
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a source is fetched.
    fn source_started(&self, name: &str, current: usize, total: usize);
    /// Called after a source's batch was submitted.
    fn source_finished(&self, report: &SourceReport);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn source_finished(&self, _report: &SourceReport) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Batch preparation
// ---------------------------------------------------------------------------

/// Everything a batch is normalized against. Built once per run.
pub struct IngestContext {
    normalizer: DateNormalizer,
    categorizer: Categorizer,
    default_region: String,
}

impl IngestContext {
    pub fn new(config: &AppConfig, now: NaiveDateTime) -> Self {
        Self {
            normalizer: DateNormalizer::new(now),
            categorizer: Categorizer::new(config.taxonomy()),
            default_region: config.defaults.region.clone(),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.normalizer.now()
    }
}

/// Documents ready for the store, plus the outcome of every input record.
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub events: Vec<NormalizedEvent>,
    pub outcomes: Vec<RecordOutcome>,
}

/// Normalize, categorize, filter and dedup one source's records. No I/O.
pub fn prepare_batch(
    records: Vec<RawEventRecord>,
    source: &SourceConfig,
    ctx: &IngestContext,
) -> PreparedBatch {
    let mut batch = PreparedBatch::default();
    let mut candidates = Vec::with_capacity(records.len());

    for record in records {
        match normalize_record(record, source, ctx) {
            Ok(event) => candidates.push(event),
            Err((title, reason)) => {
                debug!(source = %source.name, %title, %reason, "record dropped");
                batch.outcomes.push(RecordOutcome::Dropped { title, reason });
            }
        }
    }

    let (kept, duplicates) = dedup_batch(candidates);
    for dup in duplicates {
        batch.outcomes.push(RecordOutcome::Dropped {
            title: dup.title,
            reason: DropReason::Duplicate { key: dup.key },
        });
    }
    for event in &kept {
        batch.outcomes.push(RecordOutcome::Accepted {
            key: event.key.clone(),
        });
    }
    batch.events = kept;
    batch
}

fn normalize_record(
    record: RawEventRecord,
    source: &SourceConfig,
    ctx: &IngestContext,
) -> std::result::Result<NormalizedEvent, (String, DropReason)> {
    let title = record.title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        return Err((record.title, DropReason::MissingTitle));
    }

    // Poster sources carry the date in the image file name.
    let date_text = match (&record.date, source.notation) {
        (Some(text), _) => Some(text.as_str()),
        (None, Notation::FilenameDate) => record.image.as_deref(),
        (None, _) => None,
    };

    let (start, end) = match date_text {
        Some(text) => match ctx.normalizer.normalize(text, source.notation) {
            Ok(range) => (Some(range.start()), Some(range.end())),
            Err(error) => {
                warn!(source = %source.name, %title, raw = %text, %error, "date not parseable");
                let raw = text.to_string();
                return Err((title, DropReason::DateParse { raw, error }));
            }
        },
        None => (None, None),
    };

    let category = ctx.categorizer.resolve(source, &record);
    let key = key_for(&title, start);

    let event = NormalizedEvent {
        title,
        location: record
            .location
            .filter(|l| !l.trim().is_empty())
            .or_else(|| source.default_location.clone()),
        category,
        start,
        end,
        link: record.link,
        image: record.image,
        source: if record.source.is_empty() {
            source.name.clone()
        } else {
            record.source
        },
        region: if !record.region.is_empty() {
            record.region
        } else {
            source
                .region
                .clone()
                .unwrap_or_else(|| ctx.default_region.clone())
        },
        key,
        highlighted: false,
    };

    match event.terminal() {
        Some(terminal) if terminal < ctx.now() => {
            Err((event.title, DropReason::Stale { terminal }))
        }
        _ => Ok(event),
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Fetch, prepare and submit one source.
///
/// A failed fetch is an empty batch. Only a store outage is an error.
#[instrument(skip_all, fields(source = %source.name))]
pub async fn ingest_source(
    adapter: &dyn SourceAdapter,
    source: &SourceConfig,
    ctx: &IngestContext,
    store: &Storage,
) -> Result<SourceReport> {
    let mut report = SourceReport::new(&source.name);

    let records = match adapter.fetch().await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "fetch failed, treating as empty batch");
            report.fetch_error = Some(e.to_string());
            Vec::new()
        }
    };
    report.fetched = records.len();

    let batch = prepare_batch(records, source, ctx);
    report.outcomes = batch.outcomes;

    if !batch.events.is_empty() {
        report.submit = store.submit(&batch.events).await?;
    }

    info!(
        fetched = report.fetched,
        accepted = report.accepted(),
        dropped = report.dropped().count(),
        inserted = report.submit.inserted,
        updated = report.submit.updated,
        unchanged = report.submit.unchanged,
        failed = report.submit.failed.len(),
        "source ingested"
    );
    Ok(report)
}

/// Run one ingestion pass over every enabled source, or only `only` when given.
///
/// `now` is frozen for the whole run: year inference, rollover and the stale
/// filter all use it.
#[instrument(skip_all, fields(now = %now, only = ?only))]
pub async fn run_once(
    registry: &SourceRegistry,
    config: &AppConfig,
    store: &Storage,
    now: NaiveDateTime,
    only: Option<&str>,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();

    let sources: Vec<&SourceConfig> = match only {
        Some(name) => vec![config.source(name).ok_or_else(|| {
            AgendaError::validation(format!("unknown source '{name}'"))
        })?],
        None => config.sources.iter().filter(|s| s.enabled).collect(),
    };

    progress.phase("Preparing run");
    let ctx = IngestContext::new(config, now);
    let run_id = store.insert_run(only).await?;
    info!(%run_id, sources = sources.len(), "starting ingestion run");

    let mut reports = Vec::with_capacity(sources.len());
    let total = sources.len();
    for (i, source) in sources.into_iter().enumerate() {
        progress.source_started(&source.name, i + 1, total);

        let report = match registry.get(&source.name) {
            Some(adapter) => match ingest_source(adapter, source, &ctx, store).await {
                Ok(report) => report,
                Err(e) => {
                    warn!(source = %source.name, error = %e, "run aborted");
                    return Err(e);
                }
            },
            None => {
                warn!(source = %source.name, "no adapter registered");
                let mut report = SourceReport::new(&source.name);
                report.fetch_error = Some("no adapter registered".into());
                report
            }
        };

        progress.source_finished(&report);
        reports.push(report);
    }

    let report = RunReport {
        run_id,
        sources: reports,
        elapsed: start.elapsed(),
    };
    store.finish_run(&report.run_id, &report.stats_json()).await?;

    progress.done(&report);
    info!(
        run_id = %report.run_id,
        fetched = report.fetched(),
        inserted = report.inserted(),
        updated = report.updated(),
        unchanged = report.unchanged(),
        dropped = report.dropped(),
        failed = report.failed(),
        elapsed_ms = report.elapsed.as_millis(),
        "ingestion run complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use uuid::Uuid;

    use agenda_shared::{AdapterConfig, CategorySubject};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid test date")
    }

    fn now() -> NaiveDateTime {
        at(2025, 1, 10, 9, 0)
    }

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("agenda_pipeline_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    struct StaticAdapter {
        name: String,
        records: Vec<RawEventRecord>,
    }

    #[async_trait]
    impl SourceAdapter for StaticAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self) -> Result<Vec<RawEventRecord>> {
            Ok(self.records.clone())
        }
    }

    struct FailingAdapter(&'static str);

    #[async_trait]
    impl SourceAdapter for FailingAdapter {
        fn name(&self) -> &str {
            self.0
        }

        async fn fetch(&self) -> Result<Vec<RawEventRecord>> {
            Err(AgendaError::Network("connection refused".into()))
        }
    }

    /// Yields its records after dropping the catalog table behind the store's back.
    struct SchemaLossAdapter {
        name: String,
        db_path: std::path::PathBuf,
        records: Vec<RawEventRecord>,
    }

    #[async_trait]
    impl SourceAdapter for SchemaLossAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self) -> Result<Vec<RawEventRecord>> {
            let db = libsql::Builder::new_local(&self.db_path)
                .build()
                .await
                .map_err(|e| AgendaError::Storage(e.to_string()))?;
            let conn = db.connect().map_err(|e| AgendaError::Storage(e.to_string()))?;
            conn.execute("DROP TABLE events", ())
                .await
                .map_err(|e| AgendaError::Storage(e.to_string()))?;
            Ok(self.records.clone())
        }
    }

    fn source(name: &str, notation: Notation) -> SourceConfig {
        SourceConfig {
            name: name.into(),
            enabled: true,
            notation,
            region: None,
            default_location: None,
            category_from: CategorySubject::Title,
            fixed_category: None,
            adapter: AdapterConfig::Feed {
                path: format!("/tmp/{name}.json"),
            },
        }
    }

    fn raw(title: &str, date: Option<&str>, link: &str) -> RawEventRecord {
        RawEventRecord {
            title: title.into(),
            date: date.map(String::from),
            link: link.into(),
            ..Default::default()
        }
    }

    fn setup(
        sources: Vec<(SourceConfig, Vec<RawEventRecord>)>,
    ) -> (AppConfig, SourceRegistry) {
        let mut config = AppConfig::default();
        let mut registry = SourceRegistry::new();
        for (source, records) in sources {
            registry.register(Box::new(StaticAdapter {
                name: source.name.clone(),
                records,
            }));
            config.sources.push(source);
        }
        (config, registry)
    }

    // -----------------------------------------------------------------------
    // prepare_batch
    // -----------------------------------------------------------------------

    #[test]
    fn timed_date_resolves_to_future_instant() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let batch = prepare_batch(
            vec![raw("Samba na Praça", Some("17 de Ago às 14:00"), "https://s/1")],
            &source("sympla", Notation::DayMonthTime),
            &ctx,
        );
        assert_eq!(batch.events.len(), 1);
        let event = &batch.events[0];
        assert_eq!(event.start, Some(at(2025, 8, 17, 14, 0)));
        assert_eq!(event.end, event.start);
        assert_eq!(event.region, "ES");
        assert_eq!(event.source, "sympla");
    }

    #[test]
    fn short_month_range_keeps_both_days() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let batch = prepare_batch(
            vec![raw("Festival de Inverno", Some("22 E 23.AGO"), "https://b/1")],
            &source("beacons", Notation::ShortMonthMulti),
            &ctx,
        );
        let doc = batch.events[0].to_document();
        assert_eq!(doc.date.as_deref(), Some("2025-08-22T00:00:00"));
        assert_eq!(doc.end_date.as_deref(), Some("2025-08-23T00:00:00"));
    }

    #[test]
    fn category_follows_taxonomy_order() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let batch = prepare_batch(
            vec![raw("Show de Rock Acústico no Boteco", Some("17 de Ago às 14:00"), "https://s/1")],
            &source("sympla", Notation::DayMonthTime),
            &ctx,
        );
        assert_eq!(batch.events[0].category, "Música");
    }

    #[test]
    fn invalid_calendar_date_drops_only_that_record() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let batch = prepare_batch(
            vec![
                raw("Baile de Carnaval", Some("31 de Fev de 2025"), "https://l/1"),
                raw("Sarau", Some("Sáb, 19 de Julho de 2025"), "https://l/2"),
            ],
            &source("lebillet", Notation::WeekdayLong),
            &ctx,
        );
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].title, "Sarau");

        let dropped: Vec<_> = batch
            .outcomes
            .iter()
            .filter_map(|o| match o {
                RecordOutcome::Dropped { title, reason } => Some((title.as_str(), reason)),
                _ => None,
            })
            .collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].0, "Baile de Carnaval");
        assert!(matches!(
            dropped[0].1,
            DropReason::DateParse { raw, error: DateParseError::InvalidDate { .. } }
                if raw == "31 de Fev de 2025"
        ));
    }

    #[test]
    fn every_record_gets_an_outcome() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let batch = prepare_batch(
            vec![
                raw("  ", Some("17 de Ago às 14:00"), "https://s/0"),
                raw("Show", Some("17 de Ago às 14:00"), "https://s/1"),
                raw("Show", Some("17 de Ago às 14:00"), "https://s/1?utm=1"),
                raw("Show antigo", Some("05 de Jan às 10:00"), "https://s/2"),
                raw("Show sem data", Some("em breve"), "https://s/3"),
            ],
            &source("sympla", Notation::DayMonthTime),
            &ctx,
        );
        assert_eq!(batch.outcomes.len(), 5);
        assert_eq!(batch.events.len(), 1);

        let mut kinds: Vec<&str> = batch
            .outcomes
            .iter()
            .filter_map(|o| match o {
                RecordOutcome::Dropped { reason, .. } => Some(reason.kind()),
                _ => None,
            })
            .collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec!["date-parse", "duplicate", "missing-title", "stale"]);
    }

    #[test]
    fn undated_records_bypass_stale_filter() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let batch = prepare_batch(
            vec![raw("Exposição Permanente", None, "https://f/1")],
            &source("feed", Notation::NumericRange),
            &ctx,
        );
        assert_eq!(batch.events.len(), 1);
        assert!(batch.events[0].start.is_none());
        assert_eq!(batch.events[0].key.date, "");
    }

    #[test]
    fn filename_notation_reads_the_image_url() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let record = RawEventRecord {
            title: "Roupa Nova".into(),
            image: Some(
                "https://patrickribeiro.com.br/wp-content/uploads/2025/05/18JUN-ROUPA.png".into(),
            ),
            ..Default::default()
        };
        let batch = prepare_batch(vec![record], &source("patrick", Notation::FilenameDate), &ctx);
        assert_eq!(batch.events[0].start, Some(at(2025, 6, 18, 0, 0)));
    }

    #[test]
    fn source_defaults_fill_missing_fields() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, now());
        let mut sesc = source("sesc", Notation::DayMonthDashTime);
        sesc.region = Some("RJ".into());
        sesc.default_location = Some("Sesc Glória".into());
        sesc.fixed_category = Some("Teatro".into());

        let batch = prepare_batch(
            vec![raw("Noite de Poesia", Some("15 julho - 19:00"), "https://sesc/1")],
            &sesc,
            &ctx,
        );
        let event = &batch.events[0];
        assert_eq!(event.region, "RJ");
        assert_eq!(event.location.as_deref(), Some("Sesc Glória"));
        assert_eq!(event.category, "Teatro");
    }

    // -----------------------------------------------------------------------
    // run_once
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn past_events_are_never_persisted() {
        let mut records: Vec<RawEventRecord> = (1..=10)
            .map(|d| {
                raw(
                    &format!("Evento {d}"),
                    Some(&format!("{d:02}/03/2025")),
                    &format!("https://v/{d}"),
                )
            })
            .collect();
        records.push(raw("Evento passado", Some("05/01/2025"), "https://v/past"));

        let (config, registry) = setup(vec![(source("vilavelha", Notation::NumericRange), records)]);
        let store = test_storage().await;

        let report = run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .expect("run");

        assert_eq!(report.inserted(), 10);
        assert_eq!(store.count_events().await.unwrap(), 10);
        let past = store
            .get_event(&key_for("Evento passado", Some(at(2025, 1, 5, 0, 0))))
            .await
            .unwrap();
        assert!(past.is_none());
        assert_eq!(report.sources[0].drop_counts().get("stale"), Some(&1));
    }

    #[tokio::test]
    async fn link_churn_yields_one_document() {
        let records = vec![
            raw("Show de Rock", Some("17 de Ago às 14:00"), "https://x/a"),
            raw("Show de Rock", Some("17 de Ago às 14:00"), "https://x/a?utm=1"),
        ];
        let (config, registry) = setup(vec![(source("sympla", Notation::DayMonthTime), records)]);
        let store = test_storage().await;

        let report = run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.inserted(), 1);
        assert_eq!(store.count_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeated_runs_converge() {
        let records = vec![
            raw("Samba na Praça", Some("17 de Ago às 14:00"), "https://s/1"),
            raw("Peça Infantil", Some("18 de Ago às 10:00"), "https://s/2"),
        ];
        let (config, registry) = setup(vec![(source("sympla", Notation::DayMonthTime), records)]);
        let store = test_storage().await;

        let first = run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .unwrap();
        let second = run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(first.inserted(), 2);
        assert_eq!(second.inserted(), 0);
        assert_eq!(second.unchanged(), 2);
        assert_eq!(store.count_events().await.unwrap(), 2);
        assert_eq!(store.list_runs(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_does_not_stop_other_sources() {
        let mut config = AppConfig::default();
        config.sources.push(source("down", Notation::DayMonthTime));
        config.sources.push(source("sympla", Notation::DayMonthTime));

        let mut registry = SourceRegistry::new();
        registry.register(Box::new(FailingAdapter("down")));
        registry.register(Box::new(StaticAdapter {
            name: "sympla".into(),
            records: vec![raw("Samba", Some("17 de Ago às 14:00"), "https://s/1")],
        }));

        let store = test_storage().await;
        let report = run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .unwrap();

        assert!(report.sources[0].fetch_error.is_some());
        assert_eq!(report.sources[0].fetched, 0);
        assert_eq!(report.sources[1].submit.inserted, 1);
    }

    #[tokio::test]
    async fn selected_and_disabled_sources() {
        let mut disabled = source("eventim", Notation::NumericRange);
        disabled.enabled = false;
        let (config, registry) = setup(vec![
            (source("sympla", Notation::DayMonthTime), vec![
                raw("Samba", Some("17 de Ago às 14:00"), "https://s/1"),
            ]),
            (disabled, vec![raw("Ópera", Some("05/07/2025 ─ 06/07/2025"), "https://e/1")]),
        ]);
        let store = test_storage().await;

        let all = run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(all.sources.len(), 1);
        assert_eq!(all.sources[0].source, "sympla");

        let only = run_once(&registry, &config, &store, now(), Some("eventim"), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(only.inserted(), 1);

        let unknown = run_once(&registry, &config, &store, now(), Some("nope"), &SilentProgress).await;
        assert!(matches!(unknown, Err(AgendaError::Validation { .. })));
    }

    #[tokio::test]
    async fn store_outage_aborts_the_run() {
        let tmp = std::env::temp_dir().join(format!("agenda_pipeline_{}.db", Uuid::now_v7()));
        drop(Storage::open(&tmp).await.unwrap());
        let readonly = Storage::open_readonly(&tmp).await.unwrap();

        let (config, registry) = setup(vec![(source("sympla", Notation::DayMonthTime), vec![
            raw("Samba", Some("17 de Ago às 14:00"), "https://s/1"),
        ])]);

        let err = run_once(&registry, &config, &readonly, now(), None, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn store_lost_mid_run_aborts_remaining_sources() {
        let tmp = std::env::temp_dir().join(format!("agenda_pipeline_{}.db", Uuid::now_v7()));
        let store = Storage::open(&tmp).await.unwrap();

        let mut config = AppConfig::default();
        config.sources.push(source("sympla", Notation::DayMonthTime));
        config.sources.push(source("beacons", Notation::ShortMonthMulti));
        config.sources.push(source("eventim", Notation::NumericRange));

        let mut registry = SourceRegistry::new();
        registry.register(Box::new(StaticAdapter {
            name: "sympla".into(),
            records: vec![raw("Samba", Some("17 de Ago às 14:00"), "https://s/1")],
        }));
        registry.register(Box::new(SchemaLossAdapter {
            name: "beacons".into(),
            db_path: tmp.clone(),
            records: vec![raw("Festival", Some("22 E 23.AGO"), "https://b/1")],
        }));
        registry.register(Box::new(StaticAdapter {
            name: "eventim".into(),
            records: vec![raw("Ópera", Some("05/07/2025 ─ 06/07/2025"), "https://e/1")],
        }));

        let err = run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, AgendaError::StoreUnavailable(_)));
        assert!(err.is_fatal());

        let runs = store.list_runs(1).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].finished_at.is_none());
    }

    #[test]
    fn same_day_midnight_is_stale_not_next_year() {
        let config = AppConfig::default();
        let ctx = IngestContext::new(&config, at(2025, 9, 20, 15, 0));
        let batch = prepare_batch(
            vec![raw("Feira de Artesanato", Some("20.SET"), "https://b/2")],
            &source("beacons", Notation::ShortMonthSingle),
            &ctx,
        );
        assert!(batch.events.is_empty());
        assert_eq!(
            batch.outcomes,
            vec![RecordOutcome::Dropped {
                title: "Feira de Artesanato".into(),
                reason: DropReason::Stale {
                    terminal: at(2025, 9, 20, 0, 0)
                },
            }]
        );
    }

    #[tokio::test]
    async fn run_stats_are_recorded() {
        let (config, registry) = setup(vec![(source("sympla", Notation::DayMonthTime), vec![
            raw("Samba", Some("17 de Ago às 14:00"), "https://s/1"),
            raw("Baile", Some("31 de Fev às 20:00"), "https://s/2"),
        ])]);
        let store = test_storage().await;
        run_once(&registry, &config, &store, now(), None, &SilentProgress)
            .await
            .unwrap();

        let runs = store.list_runs(1).await.unwrap();
        let stats: serde_json::Value =
            serde_json::from_str(runs[0].stats_json.as_deref().unwrap()).unwrap();
        assert_eq!(stats["inserted"], 1);
        assert_eq!(stats["dropped"], 1);
        assert_eq!(stats["sources"][0]["dropped"]["date-parse"], 1);
    }
}
