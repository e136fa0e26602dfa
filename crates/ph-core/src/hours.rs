//! Fixed-point hour arithmetic.
//!
//! Hours are carried as an integer count of centihours (hundredths of an
//! hour), which makes the two-decimal business precision structural: every
//! value representable here is already quantized. The ledger stores whole
//! seconds; since one centihour is exactly 36 seconds, the hours -> seconds
//! conversion is exact and the seconds -> hours direction is the only place
//! rounding happens (half up).

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds in one centihour.
const SECONDS_PER_CENTIHOUR: i64 = 36;

/// Error parsing an hour value from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseHoursError {
    /// The input was not a decimal number.
    #[error("invalid hours value: {value}")]
    Invalid { value: String },

    /// More than two decimal places were given.
    #[error("hours support at most two decimal places, got {value}")]
    TooPrecise { value: String },

    /// Negative hour values are not accepted.
    #[error("hours cannot be negative, got {value}")]
    Negative { value: String },
}

/// An hour quantity quantized to two decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hours(i64);

impl Hours {
    /// Zero hours.
    pub const ZERO: Self = Self(0);

    /// Builds a value from a raw centihour count.
    #[must_use]
    pub const fn from_centihours(centihours: i64) -> Self {
        Self(centihours)
    }

    /// Quantizes a duration in seconds to two-decimal hours, rounding half up.
    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self((seconds * 100 + 1800).div_euclid(3600))
    }

    /// Converts to whole seconds. Exact: one centihour is 36 seconds.
    #[must_use]
    pub const fn to_seconds(self) -> i64 {
        self.0 * SECONDS_PER_CENTIHOUR
    }

    /// Returns the raw centihour count.
    #[must_use]
    pub const fn centihours(self) -> i64 {
        self.0
    }

    /// Returns the value as floating-point hours, for display and JSON only.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "display-only conversion")]
    pub const fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Subtracts, clamping at zero. This is the "remaining allowance" shape:
    /// consumption past the plan never reports a negative remainder.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 { Self(0) } else { Self(diff) }
    }

    /// Returns the smaller of the two values.
    #[must_use]
    pub const fn min(self, other: Self) -> Self {
        if self.0 <= other.0 { self } else { other }
    }

    /// Whether the value is strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Hours {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Hours {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Hours {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl FromStr for Hours {
    type Err = ParseHoursError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseHoursError::Invalid {
            value: s.to_string(),
        };
        let trimmed = s.trim();
        if trimmed.starts_with('-') {
            return Err(ParseHoursError::Negative {
                value: s.to_string(),
            });
        }
        let (whole, frac) = match trimmed.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (trimmed, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 2 {
            return Err(ParseHoursError::TooPrecise {
                value: s.to_string(),
            });
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<2}");
            padded.parse().map_err(|_| invalid())?
        };
        Ok(Self(whole * 100 + frac))
    }
}

impl Serialize for Hours {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_f64().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Hours {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("hours must be a finite number"));
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "rounded before truncation"
        )]
        Ok(Self((value * 100.0).round() as i64))
    }
}
