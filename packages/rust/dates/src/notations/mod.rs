//! Notation strategy trait and the built-in strategies.
//!
//! Each notation family is a fixed grammar tied to the sources that render it.
//! Strategies receive whitespace-normalized text and the frozen ingestion clock.

mod filename;
mod long_form;
mod month_name;
mod numeric;
mod short_month;

use chrono::NaiveDateTime;

use agenda_shared::{DateRange, Notation};

use crate::DateParseError;

pub use filename::FilenameDate;
pub use long_form::{DayRangeLong, WeekdayLong};
pub use month_name::{DayMonthDashTime, DayMonthRange, DayMonthTime};
pub use numeric::NumericRange;
pub use short_month::{ShortMonthMulti, ShortMonthSingle, SplitFragments};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One date grammar.
pub trait DateNotation: Send + Sync {
    /// The config tag this strategy serves.
    fn notation(&self) -> Notation;

    /// Parse `text` into a complete range. `now` anchors year inference and rollover.
    fn parse(&self, text: &str, now: NaiveDateTime) -> Result<DateRange, DateParseError>;

    /// Shorthand for this strategy's grammar mismatch error.
    fn no_match(&self, text: &str) -> DateParseError {
        DateParseError::NoMatch {
            notation: self.notation(),
            text: text.to_string(),
        }
    }
}

/// The strategy registered for `notation`.
pub fn strategy(notation: Notation) -> &'static dyn DateNotation {
    match notation {
        Notation::DayMonthRange => &DayMonthRange,
        Notation::DayMonthTime => &DayMonthTime,
        Notation::ShortMonthMulti => &ShortMonthMulti,
        Notation::ShortMonthSingle => &ShortMonthSingle,
        Notation::WeekdayLong => &WeekdayLong,
        Notation::DayRangeLong => &DayRangeLong,
        Notation::FilenameDate => &FilenameDate,
        Notation::NumericRange => &NumericRange,
        Notation::SplitFragments => &SplitFragments,
        Notation::DayMonthDashTime => &DayMonthDashTime,
    }
}
