//! Identity keys and intra-batch deduplication.
//!
//! Two records are the same logical event when their normalized titles and
//! canonical start instants agree. Links are deliberately not part of the
//! key, so tracking parameters and URL churn never split an event.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use agenda_shared::{IdentityKey, NormalizedEvent, format_instant};

/// Lower-case, trim and collapse internal whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Key for a title and its start instant (`None` for undated events).
pub fn key_for(title: &str, start: Option<NaiveDateTime>) -> IdentityKey {
    IdentityKey {
        title: normalize_title(title),
        date: start.as_ref().map(format_instant).unwrap_or_default(),
    }
}

/// Keep the first event per identity key, in input order.
///
/// Returns `(kept, duplicates)`.
pub fn dedup_batch(events: Vec<NormalizedEvent>) -> (Vec<NormalizedEvent>, Vec<NormalizedEvent>) {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .partition(|event| seen.insert(event.key.clone()))
}
