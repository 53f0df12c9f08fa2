//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use agenda_core::pipeline::{ProgressReporter, RunReport, SourceReport, run_once};
use agenda_shared::{
    AdapterConfig, AppConfig, IngestConfig, init_config, load_config, load_config_from,
};
use agenda_sources::SourceRegistry;
use agenda_storage::Storage;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Agenda: aggregate regional event listings into one catalog.
#[derive(Parser)]
#[command(
    name = "agenda",
    version,
    about = "Aggregate event listings from heterogeneous sources into one deduplicated catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.agenda/agenda.toml).
    #[arg(long, env = "AGENDA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one ingestion pass over the configured sources.
    Run {
        /// Only ingest this source (even if disabled).
        #[arg(short, long)]
        source: Option<String>,

        /// Catalog database (overrides `defaults.db_path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List configured sources.
    Sources,

    /// Show catalog contents, soonest first.
    Events {
        /// Only events from this source.
        #[arg(short, long)]
        source: Option<String>,

        /// Maximum rows to print.
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Catalog database (overrides `defaults.db_path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "agenda=info",
        1 => "agenda=debug",
        _ => "agenda=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { source, db } => {
            cmd_run(config_path, source.as_deref(), db.as_deref()).await
        }
        Command::Sources => cmd_sources(config_path),
        Command::Events { source, limit, db } => {
            cmd_events(config_path, source.as_deref(), limit, db.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, source: Option<&str>, db: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    if config.sources.is_empty() {
        return Err(eyre!(
            "no sources configured; add [[sources]] entries to the config file"
        ));
    }

    let mut ingest = IngestConfig::from(&config);
    if let Some(db) = db {
        ingest.db_path = db.to_path_buf();
    }

    let store = Storage::open(&ingest.db_path)
        .await?
        .with_write_timeout(ingest.write_timeout);
    let registry = SourceRegistry::from_config(&config)?;
    let now = chrono::Local::now().naive_local();

    info!(
        db = %ingest.db_path.display(),
        sources = registry.len(),
        source,
        "starting ingestion"
    );

    let reporter = CliProgress::new();
    let report = run_once(&registry, &config, &store, now, source, &reporter).await?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    for source in &report.sources {
        match &source.fetch_error {
            Some(err) => println!("  {:<16} fetch failed: {err}", source.source),
            None => println!(
                "  {:<16} fetched {:>4}  inserted {:>4}  updated {:>4}  unchanged {:>4}  dropped {:>4}  failed {:>3}",
                source.source,
                source.fetched,
                source.submit.inserted,
                source.submit.updated,
                source.submit.unchanged,
                source.dropped().count(),
                source.submit.failed.len(),
            ),
        }
    }
    println!();
    println!("  Run:       {}", report.run_id);
    println!("  Inserted:  {}", report.inserted());
    println!("  Updated:   {}", report.updated());
    println!("  Unchanged: {}", report.unchanged());
    println!("  Dropped:   {}", report.dropped());
    println!("  Failed:    {}", report.failed());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

fn cmd_sources(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    if config.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    for source in &config.sources {
        let adapter = match &source.adapter {
            AdapterConfig::Feed { path } => format!("feed {path}"),
            AdapterConfig::Html(html) => format!("html {}", html.url),
        };
        println!(
            "  {:<16} {:<8} {:<20} {}",
            source.name,
            if source.enabled { "enabled" } else { "disabled" },
            source.notation,
            adapter
        );
    }
    Ok(())
}

async fn cmd_events(
    config_path: Option<&Path>,
    source: Option<&str>,
    limit: u32,
    db: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let db_path = match db {
        Some(p) => p.to_path_buf(),
        None => IngestConfig::from(&config).db_path,
    };
    if !db_path.exists() {
        return Err(eyre!("no catalog at {}; run `agenda run` first", db_path.display()));
    }

    let store = Storage::open_readonly(&db_path).await?;
    let total = store.count_events().await?;
    let events = store.list_events(source, limit).await?;

    for event in &events {
        let doc = &event.document;
        println!(
            "  {:<19}  {:<24}  {:<12}  {}",
            doc.date.as_deref().unwrap_or("undated"),
            doc.category,
            doc.source,
            doc.title
        );
    }
    println!();
    println!("  Showing {} of {total} events", events.len());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_started(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Ingesting [{current}/{total}] {name}"));
    }

    fn source_finished(&self, report: &SourceReport) {
        self.spinner.println(format!(
            "  ✓ {} ({} accepted, {} dropped)",
            report.source,
            report.accepted(),
            report.dropped().count()
        ));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
