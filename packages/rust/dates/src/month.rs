//! Portuguese month tokens and shared field helpers.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::DateParseError;

const FULL_NAMES: [(&str, u32); 13] = [
    ("janeiro", 1),
    ("fevereiro", 2),
    ("março", 3),
    ("marco", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
];

const ABBREVIATIONS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Resolve a month token: a full name or a three-letter abbreviation, any
/// case, with optional trailing punctuation (`ago.`, `Dez,`).
pub fn month_number(token: &str) -> Result<u32, DateParseError> {
    let normalized = token
        .trim()
        .trim_end_matches(['.', ',', ';', ':'])
        .to_lowercase();

    if let Some((_, n)) = FULL_NAMES.iter().find(|(name, _)| *name == normalized) {
        return Ok(*n);
    }
    ABBREVIATIONS
        .iter()
        .position(|abbr| *abbr == normalized)
        .map(|i| i as u32 + 1)
        .ok_or_else(|| DateParseError::UnknownMonth(token.to_string()))
}

pub(crate) fn number<T: std::str::FromStr>(field: &str) -> Result<T, DateParseError> {
    field
        .parse()
        .map_err(|_| DateParseError::MalformedField(field.to_string()))
}

pub(crate) fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, DateParseError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(DateParseError::InvalidDate {
        year,
        month,
        day,
    })
}

pub(crate) fn hm(hour: &str, minute: &str) -> Result<NaiveTime, DateParseError> {
    let h: u32 = number(hour)?;
    let m: u32 = number(minute)?;
    NaiveTime::from_hms_opt(h, m, 0).ok_or_else(|| DateParseError::InvalidTime(format!("{hour}:{minute}")))
}

pub(crate) fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Move `at` to the following year, failing on 29 Feb of a non-leap target.
pub(crate) fn next_year(at: NaiveDateTime) -> Result<NaiveDateTime, DateParseError> {
    add_years(at, 1)
}

/// Shift `at` by `years`, failing on 29 Feb of a non-leap target.
pub(crate) fn add_years(at: NaiveDateTime, years: i32) -> Result<NaiveDateTime, DateParseError> {
    let year = at.year() + years;
    at.with_year(year).ok_or(DateParseError::InvalidDate {
        year,
        month: at.month(),
        day: at.day(),
    })
}
