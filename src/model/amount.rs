//! Amount type for monthly financial values.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

/// A dollar amount, which may be negative or zero.
///
/// Spreadsheet text such as `$1,000.00` or `-$60,000` parses, but only the value is kept:
/// `Display` writes the plain decimal and serialization writes a JSON number so that the
/// dashboard can chart it directly.
///
/// # Examples
///
/// ```
/// # use finviz::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("-5000.5").unwrap();
/// let b = Amount::from_str("-$5,000.50").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(b.to_string(), "-5000.50");
/// assert_eq!(b.currency(), "-$5,000.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Creates an Amount from a floating point spreadsheet value. Returns `None` for `NaN`,
    /// infinities and magnitudes `Decimal` cannot hold.
    pub fn from_f64(value: f64) -> Option<Self> {
        Decimal::from_f64(value).map(|d| Self(d.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Formats as US currency with two decimals and thousands separators, e.g. `-$1,234.50`.
    pub fn currency(&self) -> String {
        let sign = if self.0.is_sign_negative() && !self.0.is_zero() {
            "-"
        } else {
            ""
        };
        let abs = self.0.abs().to_f64().unwrap_or_default();
        format!("{sign}${}", format_num::format_num!(",.2", abs))
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parses `50`, `-50.25`, `$1,000.00` or `-$60,000`. An empty string is not an amount.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let digits = rest.strip_prefix('$').unwrap_or(rest).replace(',', "");
        let signed = if negative { format!("-{digits}") } else { digits };
        Decimal::from_str(&signed).map(Self).map_err(AmountError)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0.to_f64() {
            Some(n) => serializer.serialize_f64(n),
            None => Err(serde::ser::Error::custom(format!(
                "amount {} cannot be represented as a number",
                self.0
            ))),
        }
    }
}
