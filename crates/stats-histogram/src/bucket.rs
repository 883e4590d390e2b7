use serde_json::Value;

use crate::arena::Arena;
use crate::value::{Collation, HistogramValue};
use crate::{HistogramError, Result};

/// One equi-height bucket: the closed range `[lower_inclusive, upper_inclusive]`
/// with the fraction of all rows at or below its upper bound and an estimate
/// of the distinct values inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket<T> {
    lower_inclusive: T,
    upper_inclusive: T,
    cumulative_frequency: f64,
    num_distinct: u64,
}

impl<T> Bucket<T> {
    pub fn new(
        lower_inclusive: T,
        upper_inclusive: T,
        cumulative_frequency: f64,
        num_distinct: u64,
    ) -> Self {
        Self {
            lower_inclusive,
            upper_inclusive,
            cumulative_frequency,
            num_distinct,
        }
    }

    pub fn lower_inclusive(&self) -> &T {
        &self.lower_inclusive
    }

    pub fn upper_inclusive(&self) -> &T {
        &self.upper_inclusive
    }

    pub fn cumulative_frequency(&self) -> f64 {
        self.cumulative_frequency
    }

    pub fn num_distinct(&self) -> u64 {
        self.num_distinct
    }
}

impl<'a, T: HistogramValue<'a>> Bucket<T> {
    pub fn is_singleton(&self) -> bool {
        self.lower_inclusive.histogram_cmp(&self.upper_inclusive) == std::cmp::Ordering::Equal
    }

    pub fn distance_from_lower(&self, value: &T) -> f64 {
        value.distance_from_lower(&self.lower_inclusive, &self.upper_inclusive)
    }

    pub fn distance_from_upper(&self, value: &T) -> f64 {
        if self.is_singleton() {
            return 0.0;
        }
        1.0 - self.distance_from_lower(value)
    }

    /// `[lower, upper, cumulative_frequency, num_distinct]`
    pub fn bucket_to_json(&self) -> Result<Value> {
        let cumulative_frequency = serde_json::Number::from_f64(self.cumulative_frequency)
            .ok_or_else(|| {
                HistogramError::Serialization(format!(
                    "cumulative frequency {} is not finite",
                    self.cumulative_frequency
                ))
            })?;
        Ok(Value::Array(vec![
            self.lower_inclusive.to_json()?,
            self.upper_inclusive.to_json()?,
            Value::Number(cumulative_frequency),
            Value::from(self.num_distinct),
        ]))
    }

    pub fn bucket_from_json(json: &Value, arena: &'a Arena, collation: Collation) -> Result<Self> {
        let fields = json.as_array().ok_or_else(|| {
            HistogramError::Deserialization(format!("bucket is not an array: {json}"))
        })?;
        let [lower, upper, cumulative_frequency, num_distinct] = fields.as_slice() else {
            return Err(HistogramError::Deserialization(format!(
                "bucket has {} elements, expected 4",
                fields.len()
            )));
        };

        let cumulative_frequency = match cumulative_frequency {
            Value::Number(number) if number.is_f64() => number.as_f64(),
            _ => None,
        }
        .ok_or_else(|| {
            HistogramError::Deserialization(format!(
                "cumulative frequency is not a double: {cumulative_frequency}"
            ))
        })?;
        let num_distinct = num_distinct.as_u64().ok_or_else(|| {
            HistogramError::Deserialization(format!(
                "distinct count is not an unsigned integer: {num_distinct}"
            ))
        })?;

        let upper = T::from_json(upper, arena, collation)?;
        let lower = T::from_json(lower, arena, collation)?;
        Ok(Bucket::new(lower, upper, cumulative_frequency, num_distinct))
    }

    pub(crate) fn clone_in<'b>(&self, arena: &'b Arena) -> Result<Bucket<T::InArena<'b>>> {
        Ok(Bucket::new(
            self.lower_inclusive.clone_in(arena)?,
            self.upper_inclusive.clone_in(arena)?,
            self.cumulative_frequency,
            self.num_distinct,
        ))
    }
}
