//! Dates encoded in poster image URLs:
//! `.../uploads/2025/05/18JUN-ROUPA.png` → 18 June 2025.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use agenda_shared::{DateRange, Notation};

use super::DateNotation;
use crate::DateParseError;
use crate::month::{midnight, month_number, number, ymd};

/// `/18JUN-` on the uppercased URL.
static DAY_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{2})([A-Z]{3})-").expect("filename day regex"));

/// The upload year directory, `/2025/`.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/").expect("filename year regex"));

/// Day and month from the file name, year from the upload path. Midnight
/// instant, no rollover. Either part missing is a mismatch.
pub struct FilenameDate;

impl DateNotation for FilenameDate {
    fn notation(&self) -> Notation {
        Notation::FilenameDate
    }

    fn parse(&self, text: &str, _now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let upper = text.to_uppercase();
        let day_month = DAY_MONTH_RE
            .captures(&upper)
            .ok_or_else(|| self.no_match(text))?;
        let year = YEAR_RE.captures(&upper).ok_or_else(|| self.no_match(text))?;

        let date = ymd(
            number(&year[1])?,
            month_number(&day_month[2])?,
            number(&day_month[1])?,
        )?;
        Ok(DateRange::instant(midnight(date)))
    }
}
