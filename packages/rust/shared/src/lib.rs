//! Shared types, error model, and configuration for Agenda.
//!
//! This crate is the foundation depended on by all other Agenda crates.
//! It provides:
//! - [`AgendaError`]: the unified error type
//! - Domain types ([`RawEventRecord`], [`NormalizedEvent`], [`DateRange`], [`IdentityKey`])
//! - Configuration ([`AppConfig`], [`IngestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AdapterConfig, AppConfig, CategorySubject, DefaultsConfig, HtmlSelectors, IngestConfig,
    SourceConfig, TaxonomyEntry, config_dir, config_file_path, default_taxonomy, expand_home,
    init_config, load_config, load_config_from,
};
pub use error::{AgendaError, Result};
pub use types::{
    DateRange, EventDocument, FALLBACK_CATEGORY, ISO_FORMAT, IdentityKey, Notation,
    NormalizedEvent, RawEventRecord, format_instant, parse_instant,
};
