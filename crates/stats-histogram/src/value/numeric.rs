use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::{normalized, Collation, HistogramValue, ValueDataType};
use crate::arena::Arena;
use crate::{HistogramError, Result};

impl<'a> HistogramValue<'a> for f64 {
    type InArena<'b> = f64;

    const DATA_TYPE: ValueDataType = ValueDataType::Double;

    fn histogram_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn distance_from_lower(&self, lower: &Self, upper: &Self) -> f64 {
        normalized(self - lower, upper - lower)
    }

    fn to_json(&self) -> Result<Value> {
        Number::from_f64(*self)
            .map(Value::Number)
            .ok_or_else(|| HistogramError::Serialization(format!("non-finite double {self}")))
    }

    fn from_json(json: &Value, _arena: &'a Arena, _collation: Collation) -> Result<Self> {
        json.as_f64()
            .ok_or_else(|| HistogramError::Deserialization(format!("expected double, got {json}")))
    }

    fn clone_in<'b>(&self, _arena: &'b Arena) -> Result<f64> {
        Ok(*self)
    }

    fn is_encodable(&self) -> bool {
        self.is_finite()
    }
}

impl<'a> HistogramValue<'a> for u64 {
    type InArena<'b> = u64;

    const DATA_TYPE: ValueDataType = ValueDataType::Uint;

    fn histogram_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn distance_from_lower(&self, lower: &Self, upper: &Self) -> f64 {
        normalized(
            self.saturating_sub(*lower) as f64,
            upper.saturating_sub(*lower) as f64,
        )
    }

    fn to_json(&self) -> Result<Value> {
        Ok(Value::from(*self))
    }

    fn from_json(json: &Value, _arena: &'a Arena, _collation: Collation) -> Result<Self> {
        json.as_u64().ok_or_else(|| {
            HistogramError::Deserialization(format!("expected unsigned integer, got {json}"))
        })
    }

    fn clone_in<'b>(&self, _arena: &'b Arena) -> Result<u64> {
        Ok(*self)
    }
}

impl<'a> HistogramValue<'a> for i64 {
    type InArena<'b> = i64;

    const DATA_TYPE: ValueDataType = ValueDataType::Int;

    fn histogram_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn distance_from_lower(&self, lower: &Self, upper: &Self) -> f64 {
        let lower = i128::from(*lower);
        normalized(
            (i128::from(*self) - lower) as f64,
            (i128::from(*upper) - lower) as f64,
        )
    }

    fn to_json(&self) -> Result<Value> {
        Ok(Value::from(*self))
    }

    fn from_json(json: &Value, _arena: &'a Arena, _collation: Collation) -> Result<Self> {
        json.as_i64().ok_or_else(|| {
            HistogramError::Deserialization(format!("expected signed integer, got {json}"))
        })
    }

    fn clone_in<'b>(&self, _arena: &'b Arena) -> Result<i64> {
        Ok(*self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integer_distance_spans_full_range() {
        assert_eq!(5u64.distance_from_lower(&0, &10), 0.5);
        assert_eq!(i64::MIN.distance_from_lower(&i64::MIN, &i64::MAX), 0.0);
        assert_eq!(i64::MAX.distance_from_lower(&i64::MIN, &i64::MAX), 1.0);
        assert_eq!((-5i64).distance_from_lower(&-10, &10), 0.25);
    }

    #[test]
    fn double_order_is_total() {
        assert_eq!(1.5f64.histogram_cmp(&2.5), Ordering::Less);
        assert_eq!(f64::NAN.histogram_cmp(&f64::NAN), Ordering::Equal);
        assert_eq!(2.0f64.distance_from_lower(&1.0, &5.0), 0.25);
    }

    #[test]
    fn json_kinds_are_checked() {
        let arena = Arena::new();
        assert_eq!(u64::from_json(&json!(7), &arena, Collation::Binary), Ok(7));
        assert!(u64::from_json(&json!(-7), &arena, Collation::Binary).is_err());
        assert_eq!(i64::from_json(&json!(-7), &arena, Collation::Binary), Ok(-7));
        assert!(i64::from_json(&json!("7"), &arena, Collation::Binary).is_err());
        assert_eq!(f64::from_json(&json!(0.5), &arena, Collation::Binary), Ok(0.5));
        assert!(f64::NAN.to_json().is_err());
    }

    #[test]
    fn only_finite_doubles_are_encodable() {
        assert!(1.5f64.is_encodable());
        assert!(!f64::INFINITY.is_encodable());
        assert!(!f64::NEG_INFINITY.is_encodable());
        assert!(!f64::NAN.is_encodable());
        assert!(i64::MIN.is_encodable());
    }
}
