//! Numeric `dd/mm/yyyy` dates, single or as a range with a separator:
//! `05/07/2025 ─ 06/07/2025`, `01/08/2025 à 03/08/2025`.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use agenda_shared::{DateRange, Notation};

use super::DateNotation;
use crate::DateParseError;
use crate::month::{midnight, number, ymd};

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:\s*(?:─|–|—|-|à|a|até)\s*(\d{1,2})/(\d{1,2})/(\d{4}))?$",
    )
    .expect("numeric range regex")
});

/// Day-first numeric dates at midnight. A lone date is an instant. No rollover.
pub struct NumericRange;

impl DateNotation for NumericRange {
    fn notation(&self) -> Notation {
        Notation::NumericRange
    }

    fn parse(&self, text: &str, _now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let lower = text.to_lowercase();
        let caps = NUMERIC_RE.captures(&lower).ok_or_else(|| self.no_match(text))?;

        let start = midnight(ymd(number(&caps[3])?, number(&caps[2])?, number(&caps[1])?)?);
        let end = match (caps.get(4), caps.get(5), caps.get(6)) {
            (Some(d), Some(m), Some(y)) => midnight(ymd(
                number(y.as_str())?,
                number(m.as_str())?,
                number(d.as_str())?,
            )?),
            _ => start,
        };

        DateRange::new(start, end).ok_or_else(|| DateParseError::InvertedRange(text.to_string()))
    }
}
