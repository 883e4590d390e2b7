//! Value domains a histogram can be built over.
//!
//! Each domain supplies its own total order, a normalized distance used to
//! interpolate inside a bucket, a JSON encoding for bucket endpoints and a way
//! to duplicate itself into another arena.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arena::Arena;
use crate::Result;

mod decimal;
mod numeric;
mod string;
mod temporal;

pub use decimal::Decimal;
pub use string::CollatedStr;
pub(crate) use temporal::{format_datetime, parse_datetime};

pub trait HistogramValue<'a>: Copy + fmt::Debug + 'a {
    /// The same domain with its payload living in another arena.
    type InArena<'b>: HistogramValue<'b>;

    const DATA_TYPE: ValueDataType;

    fn histogram_cmp(&self, other: &Self) -> Ordering;

    /// Position of `self` inside `[lower, upper]`, normalized to `[0, 1]`.
    /// A degenerate range yields `0.0`.
    fn distance_from_lower(&self, lower: &Self, upper: &Self) -> f64;

    fn to_json(&self) -> Result<Value>;

    fn from_json(json: &Value, arena: &'a Arena, collation: Collation) -> Result<Self>;

    fn clone_in<'b>(&self, arena: &'b Arena) -> Result<Self::InArena<'b>>;

    /// Whether [`to_json`](Self::to_json) can represent this value.
    fn is_encodable(&self) -> bool {
        true
    }

    fn histogram_lt(&self, other: &Self) -> bool {
        self.histogram_cmp(other) == Ordering::Less
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDataType {
    Double,
    String,
    Uint,
    Int,
    Datetime,
    Decimal,
}

impl ValueDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueDataType::Double => "double",
            ValueDataType::String => "string",
            ValueDataType::Uint => "uint",
            ValueDataType::Int => "int",
            ValueDataType::Datetime => "datetime",
            ValueDataType::Decimal => "decimal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "double" => Some(ValueDataType::Double),
            "string" => Some(ValueDataType::String),
            "uint" => Some(ValueDataType::Uint),
            "int" => Some(ValueDataType::Int),
            "datetime" => Some(ValueDataType::Datetime),
            "decimal" => Some(ValueDataType::Decimal),
            _ => None,
        }
    }
}

impl fmt::Display for ValueDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collation of string values. Only the string domain looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Collation {
    #[default]
    Binary,
    Utf8mb4Bin,
    /// ASCII case-insensitive comparison.
    Utf8mb4GeneralCi,
}

impl Collation {
    pub fn id(&self) -> u64 {
        match self {
            Collation::Binary => 63,
            Collation::Utf8mb4Bin => 46,
            Collation::Utf8mb4GeneralCi => 45,
        }
    }

    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            63 => Some(Collation::Binary),
            46 => Some(Collation::Utf8mb4Bin),
            45 => Some(Collation::Utf8mb4GeneralCi),
            _ => None,
        }
    }

    /// Bytes whose plain lexicographic order is the collation order.
    pub fn sort_key<'s>(&self, bytes: &'s [u8]) -> Cow<'s, [u8]> {
        match self {
            Collation::Binary | Collation::Utf8mb4Bin => Cow::Borrowed(bytes),
            Collation::Utf8mb4GeneralCi => {
                if bytes.iter().any(u8::is_ascii_lowercase) {
                    Cow::Owned(bytes.to_ascii_uppercase())
                } else {
                    Cow::Borrowed(bytes)
                }
            }
        }
    }
}

/// `numerator / span` clamped to `[0, 1]`; degenerate spans give `0.0`.
pub(crate) fn normalized(numerator: f64, span: f64) -> f64 {
    if !(span > 0.0) {
        return 0.0;
    }
    let ratio = numerator / span;
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_names_round_trip() {
        for data_type in [
            ValueDataType::Double,
            ValueDataType::String,
            ValueDataType::Uint,
            ValueDataType::Int,
            ValueDataType::Datetime,
            ValueDataType::Decimal,
        ] {
            assert_eq!(ValueDataType::from_name(data_type.as_str()), Some(data_type));
        }
        assert_eq!(ValueDataType::from_name("enum"), None);
    }

    #[test]
    fn collation_ids_are_stable() {
        assert_eq!(Collation::from_id(Collation::Binary.id()), Some(Collation::Binary));
        assert_eq!(Collation::from_id(45), Some(Collation::Utf8mb4GeneralCi));
        assert_eq!(Collation::from_id(8), None);
    }

    #[test]
    fn case_insensitive_sort_key_folds_ascii() {
        let key = Collation::Utf8mb4GeneralCi.sort_key(b"abC");
        assert_eq!(&*key, b"ABC");
        assert_eq!(&*Collation::Binary.sort_key(b"abC"), b"abC");
    }

    #[test]
    fn normalized_handles_degenerate_spans() {
        assert_eq!(normalized(1.0, 0.0), 0.0);
        assert_eq!(normalized(5.0, 4.0), 1.0);
        assert_eq!(normalized(-1.0, 4.0), 0.0);
        assert_eq!(normalized(1.0, 4.0), 0.25);
    }
}
