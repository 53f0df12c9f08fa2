//! Core domain types for the Agenda event catalog.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category assigned when no taxonomy keyword matches.
pub const FALLBACK_CATEGORY: &str = "Other";

/// Canonical timestamp layout for persisted dates (ISO-8601, local time, no offset).
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format an instant in the canonical persisted layout.
pub fn format_instant(at: &NaiveDateTime) -> String {
    at.format(ISO_FORMAT).to_string()
}

/// Parse an instant previously written with [`format_instant`].
pub fn parse_instant(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, ISO_FORMAT).ok()
}

// ---------------------------------------------------------------------------
// Notation
// ---------------------------------------------------------------------------

/// The fixed date grammar a source renders its dates in.
///
/// Chosen per source in configuration, never inferred per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Notation {
    /// `09 de Mar a 31 de Dez`
    DayMonthRange,
    /// `17 de Ago às 14:00`
    DayMonthTime,
    /// `22 e 23.AGO`
    ShortMonthMulti,
    /// `20.SET`
    ShortMonthSingle,
    /// `Sáb, 19 de Julho de 2025`
    WeekdayLong,
    /// `27 e 28 de Junho - 21:00h`, `03 a 06 de Julho 2025`
    DayRangeLong,
    /// `.../2024/12/18JUN-ROUPA.png`
    FilenameDate,
    /// `05/07/2025 ─ 06/07/2025`
    NumericRange,
    /// Day and abbreviated month rendered in separate elements: `20 ago.`
    SplitFragments,
    /// `15 julho - 19:00`
    DayMonthDashTime,
}

impl Notation {
    /// Every supported notation, in declaration order.
    pub const ALL: [Notation; 10] = [
        Notation::DayMonthRange,
        Notation::DayMonthTime,
        Notation::ShortMonthMulti,
        Notation::ShortMonthSingle,
        Notation::WeekdayLong,
        Notation::DayRangeLong,
        Notation::FilenameDate,
        Notation::NumericRange,
        Notation::SplitFragments,
        Notation::DayMonthDashTime,
    ];

    /// Config tag for this notation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DayMonthRange => "day-month-range",
            Self::DayMonthTime => "day-month-time",
            Self::ShortMonthMulti => "short-month-multi",
            Self::ShortMonthSingle => "short-month-single",
            Self::WeekdayLong => "weekday-long",
            Self::DayRangeLong => "day-range-long",
            Self::FilenameDate => "filename-date",
            Self::NumericRange => "numeric-range",
            Self::SplitFragments => "split-fragments",
            Self::DayMonthDashTime => "day-month-dash-time",
        }
    }
}

impl std::fmt::Display for Notation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

/// A canonical temporal range. `end >= start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    /// Build a range, returning `None` when `end` precedes `start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// A single-instant range (`end == start`).
    pub fn instant(at: NaiveDateTime) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }
}

// ---------------------------------------------------------------------------
// RawEventRecord
// ---------------------------------------------------------------------------

/// Unprocessed field set emitted by a source adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventRecord {
    /// Event title (required; empty titles are dropped by the pipeline).
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Date text in the source's notation, absent when the source shows none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Source tag (filled in by the pipeline when the adapter leaves it empty).
    #[serde(default)]
    pub source: String,
    /// Category text offered by the source, may be overridden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<String>,
    /// Region code, typically a fixed constant per source.
    #[serde(default)]
    pub region: String,
}

// ---------------------------------------------------------------------------
// IdentityKey
// ---------------------------------------------------------------------------

/// Field combination deciding whether two records denote the same logical event.
///
/// `title` is already normalized; `date` is the canonical start instant, or
/// empty for undated events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub title: String,
    pub date: String,
}

impl IdentityKey {
    /// Stable document id: SHA-256 over the key fields.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.date.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.date.is_empty() {
            write!(f, "{} @ undated", self.title)
        } else {
            write!(f, "{} @ {}", self.title, self.date)
        }
    }
}

// ---------------------------------------------------------------------------
// NormalizedEvent / EventDocument
// ---------------------------------------------------------------------------

/// Canonical, categorized, date-resolved event ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub title: String,
    pub location: Option<String>,
    /// Taxonomy label or [`FALLBACK_CATEGORY`].
    pub category: String,
    pub start: Option<NaiveDateTime>,
    /// Equals `start` for single-instant events.
    pub end: Option<NaiveDateTime>,
    pub link: String,
    pub image: Option<String>,
    pub source: String,
    pub region: String,
    pub key: IdentityKey,
    pub highlighted: bool,
}

impl NormalizedEvent {
    /// The instant after which the event is over (`end`, else `start`).
    pub fn terminal(&self) -> Option<NaiveDateTime> {
        self.end.or(self.start)
    }

    /// Persisted document shape.
    pub fn to_document(&self) -> EventDocument {
        EventDocument {
            title: self.title.clone(),
            location: self.location.clone(),
            category: self.category.clone(),
            date: self.start.as_ref().map(format_instant),
            end_date: self.end.as_ref().map(format_instant),
            link: self.link.clone(),
            image: self.image.clone(),
            source: self.source.clone(),
            highlighted: self.highlighted,
            region: self.region.clone(),
        }
    }
}

/// The document written to (and read back from) the catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDocument {
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    pub category: String,
    /// ISO-8601 start instant, null for undated events.
    pub date: Option<String>,
    /// ISO-8601 end instant, null for undated events.
    pub end_date: Option<String>,
    pub link: String,
    #[serde(default)]
    pub image: Option<String>,
    pub source: String,
    #[serde(default)]
    pub highlighted: bool,
    pub region: String,
}

impl EventDocument {
    /// SHA-256 over the mutable fields; lets the store skip no-op replacements.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            self.title.as_str(),
            self.location.as_deref().unwrap_or(""),
            self.category.as_str(),
            self.date.as_deref().unwrap_or(""),
            self.end_date.as_deref().unwrap_or(""),
            self.link.as_str(),
            self.image.as_deref().unwrap_or(""),
            self.source.as_str(),
            if self.highlighted { "1" } else { "0" },
            self.region.as_str(),
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }
}
