use serde::{Deserialize, Serialize};
use std::{fmt, iter::Sum, ops, str::FromStr};

/// A Kubernetes resource quantity as it appears on the wire, e.g. `500m`, `16Gi` or `2e3`.
///
/// Quantities are kept in their textual form so that decoding an object never fails on a
/// malformed value; callers parse them into an [`Amount`] where they need arithmetic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Quantity(pub String);

/// An exact quantity, in milli-units.
///
/// Fractional values below one milli-unit are rounded up, as Kubernetes does.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i128);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("invalid suffix: {0:?}")]
    InvalidSuffix(String),

    #[error("quantity out of range")]
    Overflow,
}

// === impl Quantity ===

impl Quantity {
    pub fn amount(&self) -> Result<Amount, ParseError> {
        self.0.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Quantity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// === impl Amount ===

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn from_milli(milli: i128) -> Self {
        Self(milli)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units as i128 * 1000)
    }

    pub const fn milli(self) -> i128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl ops::Mul<i64> for Amount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self {
        Self(self.0.saturating_mul(rhs as i128))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |a, b| a + b)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}", self.0 / 1000)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

impl FromStr for Amount {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let (negative, s) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);

        let (int, frac) = match number.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (number, ""),
        };
        if (int.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(ParseError::InvalidNumber(number.to_string()));
        }

        // The number is `digits / 10^scale`.
        let mut digits = 0i128;
        for b in int.bytes().chain(frac.bytes()) {
            digits = digits
                .checked_mul(10)
                .and_then(|d| d.checked_add((b - b'0') as i128))
                .ok_or(ParseError::Overflow)?;
        }
        let scale = pow10(frac.len() as u32)?;

        let (num, den) = multiplier(suffix)?;
        let numerator = digits
            .checked_mul(num)
            .and_then(|n| n.checked_mul(1000))
            .ok_or(ParseError::Overflow)?;
        let denominator = scale.checked_mul(den).ok_or(ParseError::Overflow)?;
        let milli = (numerator + denominator - 1) / denominator;

        Ok(Self(if negative { -milli } else { milli }))
    }
}

/// Returns the suffix multiplier as a `(numerator, denominator)` pair.
fn multiplier(suffix: &str) -> Result<(i128, i128), ParseError> {
    const KI: i128 = 1024;
    let m = match suffix {
        "n" => (1, 1_000_000_000),
        "u" => (1, 1_000_000),
        "m" => (1, 1_000),
        "" => (1, 1),
        "k" => (1_000, 1),
        "M" => (pow10(6)?, 1),
        "G" => (pow10(9)?, 1),
        "T" => (pow10(12)?, 1),
        "P" => (pow10(15)?, 1),
        "E" => (pow10(18)?, 1),
        "Ki" => (KI, 1),
        "Mi" => (KI.pow(2), 1),
        "Gi" => (KI.pow(3), 1),
        "Ti" => (KI.pow(4), 1),
        "Pi" => (KI.pow(5), 1),
        "Ei" => (KI.pow(6), 1),
        s if s.starts_with(['e', 'E']) => {
            let exp = s[1..]
                .parse::<i32>()
                .map_err(|_| ParseError::InvalidSuffix(s.to_string()))?;
            if exp >= 0 {
                (pow10(exp.unsigned_abs())?, 1)
            } else {
                (1, pow10(exp.unsigned_abs())?)
            }
        }
        s => return Err(ParseError::InvalidSuffix(s.to_string())),
    };
    Ok(m)
}

fn pow10(exp: u32) -> Result<i128, ParseError> {
    10i128.checked_pow(exp).ok_or(ParseError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quantities() {
        for (input, milli) in [
            ("0", 0),
            ("4", 4_000),
            ("500m", 500),
            ("1.5", 1_500),
            ("0.1", 100),
            ("1k", 1_000_000),
            ("1.5G", 1_500_000_000_000),
            ("16Gi", 16 * 1024 * 1024 * 1024 * 1000),
            ("2e3", 2_000_000),
            ("25E-1", 2_500),
            ("1n", 1),
            ("-2", -2_000),
            ("+3", 3_000),
        ] {
            assert_eq!(
                input.parse::<Amount>(),
                Ok(Amount::from_milli(milli)),
                "{input}"
            );
        }
    }

    #[test]
    fn rejects_malformed_quantities() {
        assert_eq!("".parse::<Amount>(), Err(ParseError::Empty));
        assert!(matches!(
            "1.2.3".parse::<Amount>(),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            "Gi".parse::<Amount>(),
            Err(ParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            "10Qi".parse::<Amount>(),
            Err(ParseError::InvalidSuffix(_))
        ));
        assert_eq!("1e400".parse::<Amount>(), Err(ParseError::Overflow));
    }

    #[test]
    fn arithmetic_is_exact() {
        let cpu = Quantity::from("250m").amount().unwrap();
        assert_eq!(cpu * 4, Amount::from_units(1));
        let total: Amount = ["100m", "900m", "2"]
            .iter()
            .map(|q| q.parse::<Amount>().unwrap())
            .sum();
        assert_eq!(total, Amount::from_units(3));
        assert_eq!(total.to_string(), "3");
        assert_eq!(Amount::from_milli(1500).to_string(), "1500m");
    }
}
