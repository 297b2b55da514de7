//! Exact decimal numbers.
//!
//! A `Number` is an `i128` coefficient with a base-10 scale, so `12.30` is
//! stored as `123 × 10⁻¹`. Values are normalized on construction (no trailing
//! fractional zeros, zero has scale 0), which makes the derived equality a
//! value equality and gives every number one canonical string form.
//!
//! ```
//! use ok::number::Number;
//!
//! let a: Number = "0.1".parse().unwrap();
//! let b: Number = "0.2".parse().unwrap();
//! assert_eq!(a.add(&b).unwrap().to_string(), "0.3");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Fractional digits kept when a quotient does not terminate.
pub const DIVISION_PRECISION: u32 = 28;

/// Largest scale a number can carry; `10^38` is the largest power of ten in an `i128`.
const MAX_SCALE: u32 = 38;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    #[error("invalid number '{0}'")]
    Invalid(String),
    #[error("number out of range")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
}

type Result<T> = std::result::Result<T, NumberError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Number {
    digits: i128,
    scale: u32,
}

fn pow10(exp: u32) -> Result<i128> {
    10i128.checked_pow(exp).ok_or(NumberError::Overflow)
}

impl Number {
    pub const ZERO: Number = Number { digits: 0, scale: 0 };

    /// `digits × 10^-scale`, normalized.
    pub fn new(digits: i128, scale: u32) -> Self {
        let mut digits = digits;
        let mut scale = scale;

        if scale > MAX_SCALE {
            let excess = scale - MAX_SCALE;
            digits = match pow10(excess) {
                Ok(p) => digits / p,
                Err(_) => 0,
            };
            scale = MAX_SCALE;
        }

        if digits == 0 {
            return Number::ZERO;
        }
        while scale > 0 && digits % 10 == 0 {
            digits /= 10;
            scale -= 1;
        }
        Number { digits, scale }
    }

    pub fn is_zero(&self) -> bool {
        self.digits == 0
    }

    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }

    /// The value as an index, if it is a non-negative integer that fits.
    pub fn to_usize(&self) -> Option<usize> {
        if !self.is_integer() {
            return None;
        }
        usize::try_from(self.digits).ok()
    }

    fn rescale(&self, scale: u32) -> Result<i128> {
        debug_assert!(scale >= self.scale);
        self.digits
            .checked_mul(pow10(scale - self.scale)?)
            .ok_or(NumberError::Overflow)
    }

    /// Both coefficients brought to the larger of the two scales.
    fn align(&self, other: &Number) -> Result<(i128, i128, u32)> {
        let scale = self.scale.max(other.scale);
        Ok((self.rescale(scale)?, other.rescale(scale)?, scale))
    }

    pub fn add(&self, other: &Number) -> Result<Number> {
        let (a, b, scale) = self.align(other)?;
        let sum = a.checked_add(b).ok_or(NumberError::Overflow)?;
        Ok(Number::new(sum, scale))
    }

    pub fn sub(&self, other: &Number) -> Result<Number> {
        let (a, b, scale) = self.align(other)?;
        let difference = a.checked_sub(b).ok_or(NumberError::Overflow)?;
        Ok(Number::new(difference, scale))
    }

    pub fn mul(&self, other: &Number) -> Result<Number> {
        let product = self
            .digits
            .checked_mul(other.digits)
            .ok_or(NumberError::Overflow)?;
        Ok(Number::new(product, self.scale + other.scale))
    }

    /// Quotient truncated to `DIVISION_PRECISION` fractional digits beyond the
    /// dividend's own scale. Terminating quotients are exact.
    pub fn div(&self, other: &Number) -> Result<Number> {
        if other.is_zero() {
            return Err(NumberError::DivisionByZero);
        }

        // Widen the dividend as far as the coefficient allows.
        let mut extra = DIVISION_PRECISION + other.scale;
        let widened = loop {
            if let Some(w) = pow10(extra).ok().and_then(|p| self.digits.checked_mul(p)) {
                break w;
            }
            if extra == 0 {
                return Err(NumberError::Overflow);
            }
            extra -= 1;
        };

        let quotient = widened.checked_div(other.digits).ok_or(NumberError::Overflow)?;
        let scale = i64::from(self.scale) + i64::from(extra) - i64::from(other.scale);
        if scale < 0 {
            let shift = u32::try_from(-scale).map_err(|_| NumberError::Overflow)?;
            let digits = quotient
                .checked_mul(pow10(shift)?)
                .ok_or(NumberError::Overflow)?;
            return Ok(Number::new(digits, 0));
        }
        let scale = u32::try_from(scale).map_err(|_| NumberError::Overflow)?;
        Ok(Number::new(quotient, scale))
    }

    /// Remainder with the sign of the dividend.
    pub fn rem(&self, other: &Number) -> Result<Number> {
        if other.is_zero() {
            return Err(NumberError::DivisionByZero);
        }
        let (a, b, scale) = self.align(other)?;
        let remainder = a.checked_rem(b).ok_or(NumberError::Overflow)?;
        Ok(Number::new(remainder, scale))
    }

    pub fn neg(&self) -> Result<Number> {
        let digits = self.digits.checked_neg().ok_or(NumberError::Overflow)?;
        Ok(Number { digits, scale: self.scale })
    }

    /// Integer part and the fraction as `MAX_SCALE` digits, both carrying the
    /// sign of the number. Ordering these pairs orders the numbers exactly.
    fn parts(&self) -> (i128, i128) {
        let scale = self.scale.min(MAX_SCALE);
        let unit = 10i128.pow(scale);
        let fraction = (self.digits % unit) * 10i128.pow(MAX_SCALE - scale);
        (self.digits / unit, fraction)
    }
}

impl From<usize> for Number {
    fn from(n: usize) -> Self {
        Number::new(n as i128, 0)
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts().cmp(&other.parts())
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Number {
    type Err = NumberError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || NumberError::Invalid(s.to_string());
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) if !f.is_empty() => (i, f),
            Some(_) => return Err(invalid()),
            None => (unsigned, ""),
        };
        if int_part.is_empty()
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let frac_part = frac_part.trim_end_matches('0');
        let scale = u32::try_from(frac_part.len()).map_err(|_| NumberError::Overflow)?;
        if scale > MAX_SCALE {
            return Err(NumberError::Overflow);
        }

        let mut digits: i128 = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| NumberError::Overflow)?;
        if negative {
            digits = -digits;
        }
        Ok(Number::new(digits, scale))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.digits);
        }

        let magnitude = self.digits.unsigned_abs().to_string();
        let width = self.scale as usize + 1;
        let padded = format!("{magnitude:0>width$}");
        let (int_part, frac_part) = padded.split_at(padded.len() - self.scale as usize);
        let sign = if self.digits < 0 { "-" } else { "" };
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
