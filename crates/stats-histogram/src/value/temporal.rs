use std::cmp::Ordering;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde_json::Value;

use super::{normalized, Collation, HistogramValue, ValueDataType};
use crate::arena::Arena;
use crate::{HistogramError, Result};

const MICROS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const NANOS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn duration_as_f64(duration: Duration) -> f64 {
    duration
        .num_nanoseconds()
        .map(|nanos| nanos as f64)
        .or_else(|| duration.num_microseconds().map(|micros| micros as f64 * 1e3))
        .unwrap_or_else(|| duration.num_milliseconds() as f64 * 1e6)
}

pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    if value.nanosecond() % 1_000 == 0 {
        value.format(MICROS_FORMAT).to_string()
    } else {
        value.format(NANOS_FORMAT).to_string()
    }
}

pub(crate) fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, PARSE_FORMAT).ok()
}

impl<'a> HistogramValue<'a> for NaiveDateTime {
    type InArena<'b> = NaiveDateTime;

    const DATA_TYPE: ValueDataType = ValueDataType::Datetime;

    fn histogram_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn distance_from_lower(&self, lower: &Self, upper: &Self) -> f64 {
        normalized(
            duration_as_f64(self.signed_duration_since(*lower)),
            duration_as_f64(upper.signed_duration_since(*lower)),
        )
    }

    fn to_json(&self) -> Result<Value> {
        Ok(Value::String(format_datetime(self)))
    }

    fn from_json(json: &Value, _arena: &'a Arena, _collation: Collation) -> Result<Self> {
        json.as_str().and_then(parse_datetime).ok_or_else(|| {
            HistogramError::Deserialization(format!("expected datetime string, got {json}"))
        })
    }

    fn clone_in<'b>(&self, _arena: &'b Arena) -> Result<NaiveDateTime> {
        Ok(*self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn encodes_with_microsecond_precision() {
        assert_eq!(at(13, 5).to_json().unwrap(), json!("2024-03-01 13:05:00.000000"));
        let precise = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_nano_opt(1, 2, 3, 123_456_789)
            .unwrap();
        let encoded = precise.to_json().unwrap();
        assert_eq!(encoded, json!("2024-03-01 01:02:03.123456789"));
        let arena = Arena::new();
        assert_eq!(
            NaiveDateTime::from_json(&encoded, &arena, Collation::Binary),
            Ok(precise)
        );
    }

    #[test]
    fn rejects_malformed_timestamps() {
        let arena = Arena::new();
        assert!(NaiveDateTime::from_json(&json!("yesterday"), &arena, Collation::Binary).is_err());
        assert!(NaiveDateTime::from_json(&json!(12), &arena, Collation::Binary).is_err());
    }

    #[test]
    fn distance_is_linear_in_time() {
        assert_eq!(at(6, 0).distance_from_lower(&at(0, 0), &at(12, 0)), 0.5);
        assert_eq!(at(0, 0).distance_from_lower(&at(0, 0), &at(12, 0)), 0.0);
    }
}
