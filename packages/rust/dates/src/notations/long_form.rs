//! Long-form notations with full month names, as rendered by ticketing sites:
//! `Sáb, 19 de Julho de 2025`, `27 e 28 de Junho - 21:00h`, `03 a 06 de Julho 2025`.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use regex::Regex;

use agenda_shared::{DateRange, Notation};

use super::DateNotation;
use crate::DateParseError;
use crate::month::{hm, midnight, month_number, number, ymd};

/// `[weekday,] 19 de julho [de 2025] [- 21:00h | - 21h]`
static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[^\d\s,]+\.?,?\s+)?(\d{1,2}) de (\w+)(?: de (\d{4}))?(?: ?- ?(\d{1,2})(?:[:h](\d{2}))? ?h?)?$",
    )
    .expect("weekday long regex")
});

/// `[weekday,] 27 [e|a 28] de junho [[de] 2025] [- 21:00h | - 21h]`
static DAY_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[^\d\s,]+\.?,?\s+)?(\d{1,2})(?: (?:a|e) (\d{1,2}))? de (\w+)(?: (?:de )?(\d{4}))?(?: ?- ?(\d{1,2})(?:[:h](\d{2}))? ?h?)?$",
    )
    .expect("day range long regex")
});

fn year_or_current(field: Option<regex::Match<'_>>, now: NaiveDateTime) -> Result<i32, DateParseError> {
    match field {
        Some(m) => number(m.as_str()),
        None => Ok(now.year()),
    }
}

/// `- 21:00h`, `- 21h30`, or a bare `- 21h` meaning on the hour.
fn trailing_time(
    hour: regex::Match<'_>,
    minute: Option<regex::Match<'_>>,
) -> Result<NaiveTime, DateParseError> {
    hm(hour.as_str(), minute.map_or("00", |m| m.as_str()))
}

/// `Sáb, 19 de Julho de 2025`: the weekday token is stripped; a missing year
/// means the current one. Midnight unless a trailing `- HH:MM` is present.
/// No rollover.
pub struct WeekdayLong;

impl DateNotation for WeekdayLong {
    fn notation(&self) -> Notation {
        Notation::WeekdayLong
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let lower = text.to_lowercase();
        let caps = WEEKDAY_RE.captures(&lower).ok_or_else(|| self.no_match(text))?;

        let year = year_or_current(caps.get(3), now)?;
        let date = ymd(year, month_number(&caps[2])?, number(&caps[1])?)?;
        let at = match caps.get(4) {
            Some(h) => date.and_time(trailing_time(h, caps.get(5))?),
            None => midnight(date),
        };
        Ok(DateRange::instant(at))
    }
}

/// `27 e 28 de Junho - 21:00h`, `03 a 06 de Julho 2025`: anchored on the
/// first day of the range. The trailing time only applies to single-day
/// inputs; ranges resolve to the first day at midnight. No rollover.
pub struct DayRangeLong;

impl DateNotation for DayRangeLong {
    fn notation(&self) -> Notation {
        Notation::DayRangeLong
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let lower = text.to_lowercase();
        let caps = DAY_RANGE_RE.captures(&lower).ok_or_else(|| self.no_match(text))?;

        let year = year_or_current(caps.get(4), now)?;
        let month = month_number(&caps[3])?;
        let date = ymd(year, month, number(&caps[1])?)?;
        if let Some(last) = caps.get(2) {
            // Validate the closing day even though only the first is kept.
            ymd(year, month, number(last.as_str())?)?;
        }

        let is_range = caps.get(2).is_some();
        let at = match (is_range, caps.get(5)) {
            (false, Some(h)) => date.and_time(trailing_time(h, caps.get(6))?),
            _ => midnight(date),
        };
        Ok(DateRange::instant(at))
    }
}
