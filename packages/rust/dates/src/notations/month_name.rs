//! Day + month-name notations: `09 de Mar a 31 de Dez`, `17 de Ago às 14:00`,
//! `15 julho - 19:00`.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use regex::Regex;

use agenda_shared::{DateRange, Notation};

use super::DateNotation;
use crate::DateParseError;
use crate::month::{add_years, hm, month_number, next_year, number, ymd};

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `09 de mar a 31 de dez`, anywhere in the text.
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}) de (\w+)\.?\s+a\s+(\d{1,2}) de (\w+)").expect("range regex")
});

/// `17 de ago às 14:00`, anywhere in the text.
static TIMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}) de (\w+)\.?,? [àa]s (\d{1,2}):(\d{2})").expect("timed regex")
});

/// `15 julho - 19:00`
static DASH_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}) (\w+) ?- ?(\d{1,2}):(\d{2})").expect("dash time regex")
});

/// Range start hour when the source gives no time.
const RANGE_START: (u32, u32) = (8, 0);
/// Range end time when the source gives no time.
const RANGE_END: (u32, u32) = (23, 59);

/// Timed events older than this are assumed to belong to next year.
const ROLLOVER_DAYS: i64 = 180;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// `09 de Mar a 31 de Dez`: start at 08:00, end at 23:59, current year.
///
/// A range whose end falls before its start (`10 de Dez a 05 de Jan`) wraps
/// the new year. Parsed on or before the closing day it started last year,
/// otherwise it ends next year. No other rollover.
pub struct DayMonthRange;

impl DateNotation for DayMonthRange {
    fn notation(&self) -> Notation {
        Notation::DayMonthRange
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let lower = text.to_lowercase();
        let caps = RANGE_RE.captures(&lower).ok_or_else(|| self.no_match(text))?;

        let year = now.year();
        let start_day = ymd(year, month_number(&caps[2])?, number(&caps[1])?)?;
        let end_day = ymd(year, month_number(&caps[4])?, number(&caps[3])?)?;

        let (sh, sm) = RANGE_START;
        let (eh, em) = RANGE_END;
        let mut start = start_day.and_time(time(sh, sm));
        let mut end = end_day.and_time(time(eh, em));
        if end < start {
            if now <= end {
                start = add_years(start, -1)?;
            } else {
                end = next_year(end)?;
            }
        }

        DateRange::new(start, end).ok_or_else(|| DateParseError::InvertedRange(text.to_string()))
    }
}

/// `17 de Ago às 14:00`: an exact instant in the current year, moved to next
/// year when it lies more than 180 days in the past.
pub struct DayMonthTime;

impl DateNotation for DayMonthTime {
    fn notation(&self) -> Notation {
        Notation::DayMonthTime
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let lower = text.to_lowercase();
        let caps = TIMED_RE.captures(&lower).ok_or_else(|| self.no_match(text))?;

        let date = ymd(now.year(), month_number(&caps[2])?, number(&caps[1])?)?;
        let mut at = date.and_time(hm(&caps[3], &caps[4])?);
        if at < now && (now - at).num_days() > ROLLOVER_DAYS {
            at = next_year(at)?;
        }

        Ok(DateRange::instant(at))
    }
}

/// `15 julho - 19:00`: an exact instant in the current year. No rollover.
pub struct DayMonthDashTime;

impl DateNotation for DayMonthDashTime {
    fn notation(&self) -> Notation {
        Notation::DayMonthDashTime
    }

    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError> {
        let lower = text.to_lowercase();
        let caps = DASH_TIME_RE.captures(&lower).ok_or_else(|| self.no_match(text))?;

        let date = ymd(now.year(), month_number(&caps[2])?, number(&caps[1])?)?;
        Ok(DateRange::instant(date.and_time(hm(&caps[3], &caps[4])?)))
    }
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::at;

    #[test]
    fn range_uses_default_hours() {
        let range = DayMonthRange
            .parse("09 de Mar a 31 de Dez", at(2025, 1, 10, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2025, 3, 9, 8, 0));
        assert_eq!(range.end(), at(2025, 12, 31, 23, 59));
    }

    #[test]
    fn range_across_new_year_ends_next_year() {
        let range = DayMonthRange
            .parse("10 de Dez a 05 de Jan", at(2025, 11, 1, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2025, 12, 10, 8, 0));
        assert_eq!(range.end(), at(2026, 1, 5, 23, 59));
    }

    #[test]
    fn range_across_new_year_parsed_in_january_started_last_year() {
        let range = DayMonthRange
            .parse("10 de Dez a 05 de Jan", at(2026, 1, 3, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2025, 12, 10, 8, 0));
        assert_eq!(range.end(), at(2026, 1, 5, 23, 59));
    }

    #[test]
    fn range_across_new_year_after_closing_day_ends_next_year() {
        let range = DayMonthRange
            .parse("10 de Dez a 05 de Jan", at(2026, 1, 6, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2026, 12, 10, 8, 0));
        assert_eq!(range.end(), at(2027, 1, 5, 23, 59));
    }

    #[test]
    fn range_with_unknown_month_fails() {
        let err = DayMonthRange
            .parse("09 de Foo a 31 de Dez", at(2025, 1, 10, 9, 0))
            .unwrap_err();
        assert_eq!(err, DateParseError::UnknownMonth("foo".into()));
    }

    #[test]
    fn timed_future_instant_keeps_year() {
        let range = DayMonthTime
            .parse("17 de Ago às 14:00", at(2025, 1, 10, 9, 0))
            .unwrap();
        assert!(range.is_instant());
        assert_eq!(range.start(), at(2025, 8, 17, 14, 0));
    }

    #[test]
    fn timed_instant_far_in_past_rolls_forward() {
        let range = DayMonthTime
            .parse("05 de Jan às 10:00", at(2025, 12, 20, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2026, 1, 5, 10, 0));
    }

    #[test]
    fn timed_instant_recently_past_stays() {
        let range = DayMonthTime
            .parse("10 de Nov às 10:00", at(2025, 12, 20, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2025, 11, 10, 10, 0));
    }

    #[test]
    fn timed_accepts_long_month_names() {
        let range = DayMonthTime
            .parse("27 de junho às 18:00", at(2025, 6, 1, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2025, 6, 27, 18, 0));
    }

    #[test]
    fn timed_without_time_does_not_match() {
        let err = DayMonthTime
            .parse("17 de Ago", at(2025, 1, 10, 9, 0))
            .unwrap_err();
        assert!(matches!(err, DateParseError::NoMatch { .. }));
    }

    #[test]
    fn dash_time() {
        let range = DayMonthDashTime
            .parse("15 julho - 19:00", at(2025, 7, 1, 9, 0))
            .unwrap();
        assert_eq!(range.start(), at(2025, 7, 15, 19, 0));
        assert!(range.is_instant());
    }
}
