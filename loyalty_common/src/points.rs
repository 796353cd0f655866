use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of minor units in one loyalty point.
const MINOR_UNITS: i64 = 100;

//--------------------------------------       Points        ---------------------------------------------------------
/// A loyalty points amount, stored as a whole number of hundredths of a point.
///
/// The accrual service reports rewards as decimal numbers (e.g. `729.98`). Keeping them as fixed-point integers means
/// balances can be summed and compared exactly. On the wire, `Points` is (de)serialized as a plain JSON number.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Points(i64);

op!(binary Points, Add, add);
op!(binary Points, Sub, sub);
op!(inplace Points, AddAssign, add_assign);
op!(inplace Points, SubAssign, sub_assign);
op!(unary Points, Neg, neg);

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as loyalty points: {0}")]
pub struct PointsConversionError(String);

impl Points {
    /// Creates an amount from a raw count of hundredths of a point.
    pub fn from_minor_units(value: i64) -> Self {
        Self(value)
    }

    /// Creates an amount of whole points.
    pub fn from_points(points: i64) -> Self {
        Self(points * MINOR_UNITS)
    }

    /// The raw value in hundredths of a point. This is what is stored in the database.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / MINOR_UNITS as f64
    }

    /// Converts a decimal amount, rounding to the nearest hundredth.
    pub fn try_from_f64(value: f64) -> Result<Self, PointsConversionError> {
        if !value.is_finite() {
            return Err(PointsConversionError(format!("{value} is not a finite number")));
        }
        let scaled = (value * MINOR_UNITS as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return Err(PointsConversionError(format!("{value} is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(scaled as i64))
    }
}

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = MINOR_UNITS.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / units, abs % units)
    }
}

impl FromStr for Points {
    type Err = PointsConversionError;

    /// Parses a decimal string with at most two fractional digits, e.g. `"500"`, `"729.98"` or `"-0.5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PointsConversionError(format!("'{s}' is not a valid points amount"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) || fraction.len() > 2 {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let fraction = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| err())? * 10,
            _ => fraction.parse::<i64>().map_err(|_| err())?,
        };
        let value = whole.checked_mul(MINOR_UNITS).and_then(|w| w.checked_add(fraction)).ok_or_else(err)?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Serialize for Points {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Points::try_from_f64(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Points::from_points(500).to_string(), "500.00");
        assert_eq!(Points::from(72998).to_string(), "729.98");
        assert_eq!(Points::from(-5).to_string(), "-0.05");
        assert_eq!(Points::default().to_string(), "0.00");
    }

    #[test]
    fn parse() {
        assert_eq!("500".parse::<Points>().unwrap(), Points::from_points(500));
        assert_eq!("729.98".parse::<Points>().unwrap(), Points::from(72998));
        assert_eq!("0.5".parse::<Points>().unwrap(), Points::from(50));
        assert_eq!("-3.1".parse::<Points>().unwrap(), Points::from(-310));
        assert!("".parse::<Points>().is_err());
        assert!("1.234".parse::<Points>().is_err());
        assert!("12a".parse::<Points>().is_err());
        assert!(".5".parse::<Points>().is_err());
    }

    #[test]
    fn json_numbers() {
        let p: Points = serde_json::from_str("729.98").unwrap();
        assert_eq!(p, Points::from(72998));
        let p: Points = serde_json::from_str("500").unwrap();
        assert_eq!(p, Points::from_points(500));
        assert_eq!(serde_json::to_string(&Points::from(1050)).unwrap(), "10.5");
        assert!(Points::try_from_f64(f64::NAN).is_err());
    }

    #[test]
    fn arithmetic() {
        let mut balance = Points::from_points(300);
        balance += Points::from_points(500);
        balance -= Points::from_points(300);
        assert_eq!(balance, Points::from_points(500));
        let total: Points = [Points::from(1), Points::from(2), Points::from(3)].into_iter().sum();
        assert_eq!(total, Points::from(6));
        assert!((-total).is_negative());
    }
}
