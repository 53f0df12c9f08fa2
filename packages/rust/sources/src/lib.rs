//! Source adapters: where raw event records come from.
//!
//! This crate provides:
//! - [`SourceAdapter`]: the one interface every source is fetched through
//! - [`FeedAdapter`]: JSON array of raw records on disk
//! - [`HtmlAdapter`]: one listing page, cards extracted with configured CSS selectors
//! - [`SourceRegistry`]: one adapter per configured source, built from [`AppConfig`](agenda_shared::AppConfig)

pub mod adapters;

pub use adapters::{FeedAdapter, HtmlAdapter, SourceAdapter, SourceRegistry};
