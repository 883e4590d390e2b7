use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::{normalized, Collation, HistogramValue, ValueDataType};
use crate::arena::Arena;
use crate::{HistogramError, Result};

pub const MAX_DECIMAL_SCALE: u8 = 38;

/// Fixed-point decimal: `unscaled * 10^-scale`.
///
/// Equality and ordering are numeric, so `1.5` and `1.50` compare equal.
#[derive(Clone, Copy)]
pub struct Decimal {
    unscaled: i128,
    scale: u8,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u8) -> Result<Self> {
        if scale > MAX_DECIMAL_SCALE {
            return Err(HistogramError::InvalidArgument(format!(
                "decimal scale {scale} exceeds {MAX_DECIMAL_SCALE}"
            )));
        }
        Ok(Self { unscaled, scale })
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(i32::from(self.scale))
    }

    fn rescaled(&self, scale: u8) -> Option<i128> {
        let factor = 10i128.checked_pow(u32::from(scale - self.scale))?;
        self.unscaled.checked_mul(factor)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        match (self.rescaled(scale), other.rescaled(scale)) {
            (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
            // Only the operand with the smaller scale is rescaled, and it can
            // only overflow when its magnitude exceeds the other operand.
            (None, _) if self.unscaled < 0 => Ordering::Less,
            (None, _) => Ordering::Greater,
            (_, None) if other.unscaled < 0 => Ordering::Greater,
            (_, None) => Ordering::Less,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let digits = self.unscaled.unsigned_abs().to_string();
        let scale = usize::from(self.scale);
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Decimal {
    type Err = HistogramError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || HistogramError::InvalidArgument(format!("invalid decimal literal {s:?}"));
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(invalid());
        }
        let scale = u8::try_from(frac_part.len()).map_err(|_| invalid())?;
        let mut unscaled: i128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(digit - b'0')))
                .ok_or_else(invalid)?;
        }
        Decimal::new(if negative { -unscaled } else { unscaled }, scale)
    }
}

impl<'a> HistogramValue<'a> for Decimal {
    type InArena<'b> = Decimal;

    const DATA_TYPE: ValueDataType = ValueDataType::Decimal;

    fn histogram_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn distance_from_lower(&self, lower: &Self, upper: &Self) -> f64 {
        let scale = self.scale.max(lower.scale).max(upper.scale);
        match (self.rescaled(scale), lower.rescaled(scale), upper.rescaled(scale)) {
            (Some(value), Some(lower), Some(upper)) => normalized(
                value.saturating_sub(lower) as f64,
                upper.saturating_sub(lower) as f64,
            ),
            _ => normalized(
                self.to_f64() - lower.to_f64(),
                upper.to_f64() - lower.to_f64(),
            ),
        }
    }

    fn to_json(&self) -> Result<Value> {
        Ok(Value::String(self.to_string()))
    }

    fn from_json(json: &Value, _arena: &'a Arena, _collation: Collation) -> Result<Self> {
        let parsed = match json {
            Value::String(text) => text.parse::<Decimal>(),
            Value::Number(number) => number.to_string().parse::<Decimal>(),
            _ => Err(HistogramError::Deserialization(format!(
                "expected decimal, got {json}"
            ))),
        };
        parsed.map_err(|err| match err {
            HistogramError::Deserialization(_) => err,
            other => HistogramError::Deserialization(other.to_string()),
        })
    }

    fn clone_in<'b>(&self, _arena: &'b Arena) -> Result<Decimal> {
        Ok(*self)
    }
}
