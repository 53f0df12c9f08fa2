//! Core ingestion logic for Agenda.
//!
//! This crate ties date normalization, categorization, identity resolution
//! and persistence into one ingestion run ([`pipeline::run_once`]).

pub mod categorize;
pub mod identity;
pub mod pipeline;

pub use categorize::Categorizer;
pub use identity::{dedup_batch, key_for, normalize_title};
pub use pipeline::{
    DropReason, IngestContext, PreparedBatch, ProgressReporter, RecordOutcome, RunReport,
    SilentProgress, SourceReport, ingest_source, prepare_batch, run_once,
};
