//! Abbreviated-month notations used by poster and carousel layouts:
//! `22 e 23.AGO`, `20.SET`, and split `20` / `ago.` fragments.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime};
use regex::Regex;

use agenda_shared::{DateRange, Notation};

use super::DateNotation;
use crate::DateParseError;
use crate::month::{midnight, month_number, next_year, number, ymd};

/// `22E23.AGO` (spaces already removed).
static MULTI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})E(\d{1,2})\.(\w+?)\.?$").expect("multi-day regex")
});

/// `20.SET`
static SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\w+?)\.?$").expect("single-day regex"));

/// Posters drop all spacing inconsistently (`22 E 23.AGO`, `22E23.AGO`).
fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Single day without a year: moved to next year when strictly before today.
///
/// Today keeps its year and resolves to midnight, so the stale filter drops it
/// for the rest of the day instead of storing it a year ahead.
fn upcoming(day: u32, month: u32, now: NaiveDateTime) -> Result<NaiveDateTime, DateParseError> {
    let at = midnight(ymd(now.year(), month, day)?);
    if at.date() < now.date() {
        next_year(at)
    } else {
        Ok(at)
    }
}

/// `22 e 23.AGO`: consecutive days at midnight in the current year. No rollover.
pub struct ShortMonthMulti;

impl DateNotation for ShortMonthMulti {
    fn notation(&self) -> Notation {
        Notation::ShortMonthMulti
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let raw = compact(text);
        let caps = MULTI_RE.captures(&raw).ok_or_else(|| self.no_match(text))?;

        let month = month_number(&caps[3])?;
        let start = midnight(ymd(now.year(), month, number(&caps[1])?)?);
        let end = midnight(ymd(now.year(), month, number(&caps[2])?)?);

        DateRange::new(start, end).ok_or_else(|| DateParseError::InvertedRange(text.to_string()))
    }
}

/// `20.SET`: one midnight instant, next year if already past.
pub struct ShortMonthSingle;

impl DateNotation for ShortMonthSingle {
    fn notation(&self) -> Notation {
        Notation::ShortMonthSingle
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let raw = compact(text);
        let caps = SINGLE_RE.captures(&raw).ok_or_else(|| self.no_match(text))?;

        let at = upcoming(number(&caps[1])?, month_number(&caps[2])?, now)?;
        Ok(DateRange::instant(at))
    }
}

/// Day and abbreviated month rendered in separate elements, joined by the
/// adapter with a space: `20 ago.`, `7 jan.`. Trailing punctuation on the
/// month varies per card. One midnight instant, next year if already past.
pub struct SplitFragments;

impl DateNotation for SplitFragments {
    fn notation(&self) -> Notation {
        Notation::SplitFragments
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let mut parts = text.split_whitespace();
        let (Some(day), Some(month), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(self.no_match(text));
        };

        let day = day.trim_end_matches(['.', ',']);
        let at = upcoming(number(day)?, month_number(month)?, now)?;
        Ok(DateRange::instant(at))
    }
}
