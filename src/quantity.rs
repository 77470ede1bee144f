//! Kubernetes resource quantities
//!
//! Quantities such as `500m`, `2`, `1Gi` or `1e3` are kept as a decimal
//! mantissa and a base-10 exponent so that CPU and memory conversions stay in
//! integer arithmetic. Binary suffixes are folded into the mantissa.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A non-negative resource quantity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantity {
    mantissa: u128,
    exponent: i32,
    text: String,
}

impl Quantity {
    /// Parse a quantity string
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if s.is_empty() {
            return Err(Error::invalid_quantity(input, "empty quantity"));
        }
        let body = s.strip_prefix('+').unwrap_or(s);
        if body.starts_with('-') {
            return Err(Error::invalid_quantity(input, "negative quantities are not allowed"));
        }

        let number_end = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (number, suffix) = body.split_at(number_end);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if frac_part.contains('.') {
            return Err(Error::invalid_quantity(input, "more than one decimal point"));
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::invalid_quantity(input, "missing numeric part"));
        }

        let mut mantissa: u128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(u128::from(digit - b'0')))
                .ok_or_else(|| Error::invalid_quantity(input, "too many digits"))?;
        }
        let frac_len = i32::try_from(frac_part.len())
            .map_err(|_| Error::invalid_quantity(input, "too many digits"))?;

        let (suffix_exponent, binary_power) = parse_suffix(suffix)
            .ok_or_else(|| Error::invalid_quantity(input, format!("unknown suffix {:?}", suffix)))?;

        if binary_power > 0 {
            let factor = 1024u128
                .checked_pow(binary_power)
                .ok_or_else(|| Error::invalid_quantity(input, "value out of range"))?;
            mantissa = mantissa
                .checked_mul(factor)
                .ok_or_else(|| Error::invalid_quantity(input, "value out of range"))?;
        }

        Ok(Self {
            mantissa,
            exponent: suffix_exponent.saturating_sub(frac_len),
            text: s.to_string(),
        })
    }

    /// Whole units, e.g. `Quantity::from_units(2)` is two CPUs
    pub fn from_units(units: u64) -> Self {
        Self {
            mantissa: u128::from(units),
            exponent: 0,
            text: units.to_string(),
        }
    }

    /// Thousandths of a unit, e.g. millicores
    pub fn from_milli(milli: u64) -> Self {
        Self {
            mantissa: u128::from(milli),
            exponent: -3,
            text: format!("{}m", milli),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// Value in thousandths, rounded up
    pub fn milli_value(&self) -> u64 {
        self.scaled(-3)
    }

    /// Value in whole units, rounded up
    pub fn value(&self) -> u64 {
        self.scaled(0)
    }

    /// Ceiling of the quantity expressed in units of `10^scale`, saturating at `u64::MAX`.
    fn scaled(&self, scale: i32) -> u64 {
        if self.mantissa == 0 {
            return 0;
        }
        let shift = self.exponent.saturating_sub(scale);
        let scaled = if shift >= 0 {
            10u128
                .checked_pow(shift.unsigned_abs())
                .and_then(|factor| self.mantissa.checked_mul(factor))
        } else {
            match 10u128.checked_pow(shift.unsigned_abs()) {
                Some(divisor) => Some(self.mantissa.div_ceil(divisor)),
                // Smaller than one unit at this scale but still non-zero.
                None => Some(1),
            }
        };
        scaled
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(u64::MAX)
    }
}

/// Returns (decimal exponent, binary power of 1024) for a suffix.
fn parse_suffix(suffix: &str) -> Option<(i32, u32)> {
    let parsed = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 1),
        "Mi" => (0, 2),
        "Gi" => (0, 3),
        "Ti" => (0, 4),
        "Pi" => (0, 5),
        "Ei" => (0, 6),
        _ => {
            let exp = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))?;
            (exp.parse::<i32>().ok()?, 0)
        }
    };
    Some(parsed)
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Text(String),
    Integer(u64),
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RawQuantity::deserialize(deserializer)? {
            RawQuantity::Text(s) => Quantity::parse(&s).map_err(de::Error::custom),
            RawQuantity::Integer(n) => Ok(Quantity::from_units(n)),
        }
    }
}
