//! Application configuration for Agenda.
//!
//! User config lives at `~/.agenda/agenda.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};
use crate::types::{FALLBACK_CATEGORY, Notation};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "agenda.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".agenda";

// ---------------------------------------------------------------------------
// Config structs (matching agenda.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Registered sources, processed in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceConfig>,

    /// Ordered category taxonomy. Empty means the built-in one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taxonomy: Vec<TaxonomyEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Catalog database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Region code stamped on events whose source sets none.
    #[serde(default = "default_region")]
    pub region: String,

    /// Upper bound for a single store write before the run is aborted.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// HTTP timeout for the `html` adapter.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            region: default_region(),
            write_timeout_ms: default_write_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_db_path() -> String {
    "~/.agenda/agenda.db".into()
}
fn default_region() -> String {
    "ES".into()
}
fn default_write_timeout() -> u64 {
    10_000
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source tag, written to every event from this source.
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Date grammar this source renders.
    pub notation: Notation,

    /// Region override for this source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Location used when a record carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_location: Option<String>,

    /// Which text the categorizer looks at.
    #[serde(default)]
    pub category_from: CategorySubject,

    /// Fixed taxonomy label for every event of this source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_category: Option<String>,

    /// How records are obtained.
    pub adapter: AdapterConfig,
}

/// Subject text handed to the categorizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategorySubject {
    #[default]
    Title,
    TitleLocation,
    Hint,
}

/// `[sources.adapter]` table, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AdapterConfig {
    /// JSON array of raw records on disk.
    Feed { path: String },
    /// One HTML page, cards extracted with CSS selectors.
    Html(HtmlSelectors),
}

/// CSS selectors for the `html` adapter. Field selectors are relative to a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlSelectors {
    pub url: String,
    pub card: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Second date fragment (month), joined to `date` with a space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_month: Option<String>,
    /// Anchor selector; when absent the card's own `href` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// `[[taxonomy]]` entry: one label and its keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub label: String,
    pub keywords: Vec<String>,
}

impl TaxonomyEntry {
    fn new(label: &str, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// The built-in taxonomy. Order matters: the first matching label wins.
pub fn default_taxonomy() -> Vec<TaxonomyEntry> {
    vec![
        TaxonomyEntry::new(
            "Esporte",
            &[
                "corrida", "futebol", "bike", "esporte", "atleta", "volei", "skate",
                "campeonato", "trilha", "ciclismo", "basquete", "esportiva",
            ],
        ),
        TaxonomyEntry::new(
            "Teatro",
            &[
                "peça", "drama", "ator", "palco", "teatro", "atriz", "espetáculo",
                "monólogo", "encenação", "cena",
            ],
        ),
        TaxonomyEntry::new(
            "Música",
            &[
                "show", "música", "musica", "concerto", "banda", "pagode", "samba", "rock",
                "dj", "festival", "sertanejo", "dança", "bailão", "mpb", "funk", "eletrônica",
            ],
        ),
        TaxonomyEntry::new(
            "Stand Up Comedy",
            &[
                "stand up", "comédia", "humor", "piada", "comico", "engraçado", "risada",
                "humorista",
            ],
        ),
        TaxonomyEntry::new(
            "Gastronomia",
            &[
                "gastronomia", "culinária", "comida", "boteco", "degustação", "vinho",
                "cozinha", "chef", "churrasco", "cerveja", "feira gastronômica",
            ],
        ),
        TaxonomyEntry::new(
            "Digital",
            &[
                "podcast", "vídeo", "video", "entrevista", "audiovisual", "rádio", "online",
                "streaming", "sympla play", "transmissão", "plataforma",
            ],
        ),
        TaxonomyEntry::new(
            "Cursos e Workshops",
            &[
                "curso", "workshop", "aula", "oficina", "treinamento", "capacitação",
                "mentoria", "aprendizado", "formação",
            ],
        ),
        TaxonomyEntry::new(
            "Congressos e Palestras",
            &[
                "palestra", "congresso", "debate", "seminário", "mesa redonda", "talk",
                "evento técnico",
            ],
        ),
        TaxonomyEntry::new(
            "Passeios e Tours",
            &["tour", "passeio", "visita guiada", "excursão", "trilha", "bike tour", "viagem"],
        ),
        TaxonomyEntry::new(
            "Infantil",
            &["infantil", "criança", "kids", "palhaço", "desenho", "brinquedo", "família"],
        ),
        TaxonomyEntry::new(
            "Religião e Espiritualidade",
            &[
                "religião", "espiritualidade", "oração", "retiro", "missa", "evangelho",
                "culto", "fé", "igreja",
            ],
        ),
        TaxonomyEntry::new(
            "Pride",
            &["pride", "lgbt", "lgbtqia+", "diversidade", "parada", "orgulho", "inclusão"],
        ),
        TaxonomyEntry::new(
            "Eventos Online",
            &["evento online", "online", "ao vivo", "remoto", "streaming", "webinar"],
        ),
    ]
}

impl AppConfig {
    /// The taxonomy in effect: configured entries, else the built-in list.
    pub fn taxonomy(&self) -> Vec<TaxonomyEntry> {
        if self.taxonomy.is_empty() {
            default_taxonomy()
        } else {
            self.taxonomy.clone()
        }
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let taxonomy = self.taxonomy();
        let mut labels = HashSet::new();
        for entry in &taxonomy {
            if entry.label.trim().is_empty() {
                return Err(AgendaError::validation("taxonomy label must not be empty"));
            }
            if entry.label == FALLBACK_CATEGORY {
                return Err(AgendaError::validation(format!(
                    "'{FALLBACK_CATEGORY}' is reserved for unmatched events"
                )));
            }
            if !labels.insert(entry.label.as_str()) {
                return Err(AgendaError::validation(format!(
                    "taxonomy label '{}' declared twice",
                    entry.label
                )));
            }
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AgendaError::validation("source name must not be empty"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(AgendaError::validation(format!(
                    "source '{}' declared twice",
                    source.name
                )));
            }
            if let Some(fixed) = &source.fixed_category {
                if fixed != FALLBACK_CATEGORY && !labels.contains(fixed.as_str()) {
                    return Err(AgendaError::validation(format!(
                        "source '{}': fixed_category '{fixed}' is not a taxonomy label",
                        source.name
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ingest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime ingestion settings, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Catalog database file.
    pub db_path: PathBuf,
    /// Per-write acknowledgement deadline.
    pub write_timeout: Duration,
    /// HTTP timeout for page-fetching adapters.
    pub fetch_timeout: Duration,
}

impl From<&AppConfig> for IngestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            db_path: expand_home(&config.defaults.db_path),
            write_timeout: Duration::from_millis(config.defaults.write_timeout_ms),
            fetch_timeout: Duration::from_secs(config.defaults.fetch_timeout_secs),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.agenda/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| AgendaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.agenda/agenda.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AgendaError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| AgendaError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AgendaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AgendaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AgendaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
