//! Source date text → canonical temporal ranges.
//!
//! This crate provides:
//! - [`DateNormalizer`]: resolves date text for a given [`Notation`] against a frozen "now"
//! - [`notations`]: one strategy per notation family behind the [`DateNotation`] trait
//! - [`DateParseError`]: why a piece of text could not be resolved
//!
//! Every strategy returns a complete [`DateRange`] or an error, never a partial result.

mod month;
pub mod notations;

use chrono::NaiveDateTime;

use agenda_shared::{DateRange, Notation};

pub use month::month_number;
pub use notations::{DateNotation, strategy};

/// Why a date string could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateParseError {
    /// The month token is not a Portuguese month name or abbreviation.
    #[error("unrecognized month token '{0}'")]
    UnknownMonth(String),

    /// A numeric field (day, year) could not be read.
    #[error("malformed numeric field '{0}'")]
    MalformedField(String),

    /// The text does not follow the notation's grammar.
    #[error("'{text}' does not match the {notation} notation")]
    NoMatch { notation: Notation, text: String },

    /// Fields parsed but do not form a calendar date.
    #[error("{year:04}-{month:02}-{day:02} is not a calendar date")]
    InvalidDate { year: i32, month: u32, day: u32 },

    /// Hour or minute out of range.
    #[error("invalid time of day '{0}'")]
    InvalidTime(String),

    /// The range ends before it starts.
    #[error("range ends before it starts: '{0}'")]
    InvertedRange(String),
}

/// Resolves source date text into canonical ranges relative to one instant.
///
/// `now` is frozen at construction so every record of an ingestion run is
/// resolved against the same clock (year inference and rollover depend on it).
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    now: NaiveDateTime,
}

impl DateNormalizer {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Normalize `text` written in `notation`.
    pub fn normalize(&self, text: &str, notation: Notation) -> Result<DateRange, DateParseError> {
        let cleaned = clean(text);
        if cleaned.is_empty() {
            return Err(DateParseError::NoMatch {
                notation,
                text: text.to_string(),
            });
        }
        strategy(notation).parse(&cleaned, self.now)
    }
}

/// Replace non-breaking spaces and collapse whitespace runs.
fn clean(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
