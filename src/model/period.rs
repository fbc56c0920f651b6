//! Calendar types: `Month` and `Year`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month. The declaration order is the calendar order, so sorting by `Month` (or by
/// `Month::ordinal`) sorts January through December rather than alphabetically.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Month {
    January = 1,
    February = 2,
    March = 3,
    April = 4,
    May = 5,
    June = 6,
    July = 7,
    August = 8,
    September = 9,
    October = 10,
    November = 11,
    December = 12,
}

serde_plain::derive_display_from_serialize!(Month);

impl Month {
    /// All months in calendar order.
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// The month number, 1 for January through 12 for December.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the month for `ordinal` (1-12).
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal).checked_sub(1)?).copied()
    }
}

/// The string was not the name of a calendar month.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MonthError(String);

impl Display for MonthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is not a calendar month", self.0)
    }
}

impl std::error::Error for MonthError {}

impl FromStr for Month {
    type Err = MonthError;

    /// Accepts full English month names and their three-letter abbreviations, in any case, with
    /// surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.len() < 3 {
            return Err(MonthError(s.to_string()));
        }
        Month::ALL
            .into_iter()
            .find(|m| {
                let name = m.to_string().to_lowercase();
                name == lower || (lower.len() == 3 && name.starts_with(&lower))
            })
            .ok_or_else(|| MonthError(s.to_string()))
    }
}

/// A four-digit calendar year.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Year(u16);

impl Year {
    pub const MIN: u16 = 1000;
    pub const MAX: u16 = 9999;

    /// Returns `None` unless `value` has exactly four digits.
    pub fn new(value: u16) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

/// The value was not a four-digit year.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct YearError(String);

impl Display for YearError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is not a four-digit year", self.0)
    }
}

impl std::error::Error for YearError {}

impl TryFrom<u16> for Year {
    type Error = YearError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Year::new(value).ok_or_else(|| YearError(value.to_string()))
    }
}

impl From<Year> for u16 {
    fn from(year: Year) -> Self {
        year.0
    }
}

impl FromStr for Year {
    type Err = YearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(YearError(s.to_string()));
        }
        trimmed
            .parse::<u16>()
            .ok()
            .and_then(Year::new)
            .ok_or_else(|| YearError(s.to_string()))
    }
}

impl Display for Year {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
