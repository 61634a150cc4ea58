//! Resource quantities in integer milli-units.
//!
//! Utilization is a ratio of two quantities of the same dimension, so both
//! sides are kept as exact integers (millicores for CPU, milli-bytes for
//! memory) and only divided once, as `f64`, when the ratio is taken.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing a quantity string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity `{0}`")]
    Invalid(String),

    #[error("unknown quantity suffix `{suffix}` in `{input}`")]
    UnknownSuffix { input: String, suffix: String },

    #[error("quantity `{0}` is out of range")]
    Overflow(String),
}

/// A non-negative resource amount stored as milli-units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(u64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    pub const fn from_millis(millis: u64) -> Self {
        Quantity(millis)
    }

    pub const fn from_units(units: u64) -> Self {
        Quantity(units.saturating_mul(1000))
    }

    pub const fn millis(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self / capacity` as a ratio, or `None` when `capacity` is zero.
    pub fn ratio_of(&self, capacity: Quantity) -> Option<f64> {
        if capacity.is_zero() {
            return None;
        }
        Some(self.0 as f64 / capacity.0 as f64)
    }

    /// Parse a Kubernetes-style quantity (`"2"`, `"500m"`, `"1.5Gi"`, `"64M"`).
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);

        let multiplier: u128 = match suffix {
            "m" => 1,
            "" => 1_000,
            "k" => 1_000 * 1_000,
            "M" => 1_000 * 1_000_000,
            "G" => 1_000 * 1_000_000_000,
            "T" => 1_000 * 1_000_000_000_000,
            "Ki" => 1_000 * (1 << 10),
            "Mi" => 1_000 * (1 << 20),
            "Gi" => 1_000 * (1 << 30),
            "Ti" => 1_000 * (1 << 40),
            _ => {
                return Err(QuantityError::UnknownSuffix {
                    input: input.to_string(),
                    suffix: suffix.to_string(),
                });
            }
        };

        let (whole, fraction) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(QuantityError::Invalid(input.to_string()));
        }
        if fraction.contains('.') {
            return Err(QuantityError::Invalid(input.to_string()));
        }

        let overflow = || QuantityError::Overflow(input.to_string());
        let digits = format!("{whole}{fraction}");
        let mantissa: u128 = digits.parse().map_err(|_| overflow())?;
        let scale = 10u128
            .checked_pow(fraction.len() as u32)
            .ok_or_else(overflow)?;
        let millis = mantissa.checked_mul(multiplier).ok_or_else(overflow)? / scale;

        u64::try_from(millis).map(Quantity).map_err(|_| overflow())
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quantity::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}", self.0 / 1000)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u64),
            Float(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Int(units) => units
                .checked_mul(1000)
                .map(Quantity)
                .ok_or_else(|| serde::de::Error::custom(format!("quantity {units} is out of range"))),
            Repr::Float(units) if units.is_finite() && units >= 0.0 => {
                Ok(Quantity((units * 1000.0) as u64))
            }
            Repr::Float(units) => Err(serde::de::Error::custom(format!(
                "invalid quantity {units}"
            ))),
            Repr::Text(s) => Quantity::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}
