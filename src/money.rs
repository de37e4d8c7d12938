//! Monetary amounts in minor currency units.
//!
//! Every amount inside the engine is an exact `i64` count of the smallest
//! currency unit (cents, paise). `MajorUnits` exists only for the
//! presentation layer: it renders a minor-unit amount as a fixed-scale
//! decimal string via `rust_decimal`, never via floating point.

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

/// A signed amount in minor currency units.
pub type Amount = i64;

/// A minor-unit amount rendered in major units with a fixed scale.
///
/// # Examples
///
/// ```
/// use settle_engine::MajorUnits;
///
/// assert_eq!(MajorUnits::from_minor(10050).to_string(), "100.50");
/// assert_eq!(MajorUnits::from_minor(-7).to_string(), "-0.07");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct MajorUnits(Decimal);

impl MajorUnits {
    /// Number of minor units per major unit, as a power of ten.
    pub const SCALE: u32 = 2;

    /// Converts an exact minor-unit amount. Lossless for every `i64`.
    pub fn from_minor(amount: Amount) -> Self {
        MajorUnits(Decimal::new(amount, Self::SCALE))
    }
}

impl From<Amount> for MajorUnits {
    fn from(amount: Amount) -> Self {
        MajorUnits::from_minor(amount)
    }
}

impl fmt::Display for MajorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for MajorUnits {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
