//! Metadata shared by every histogram kind and the JSON envelope around it.

use std::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value::{Collation, ValueDataType};
use crate::{HistogramError, Result};

/// Null fraction of a histogram that has not been built yet.
pub const INVALID_NULL_VALUES_FRACTION: f64 = -1.0;

pub(crate) const KEY_LAST_UPDATED: &str = "last-updated";
pub(crate) const KEY_HISTOGRAM_TYPE: &str = "histogram-type";
pub(crate) const KEY_NULL_VALUES: &str = "null-values";
pub(crate) const KEY_COLLATION_ID: &str = "collation-id";
pub(crate) const KEY_SAMPLING_RATE: &str = "sampling-rate";
pub(crate) const KEY_NUM_BUCKETS_SPECIFIED: &str = "number-of-buckets-specified";
pub(crate) const KEY_DATA_TYPE: &str = "data-type";
pub(crate) const KEY_BUCKETS: &str = "buckets";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnIdentity {
    pub database: String,
    pub table: String,
    pub column: String,
}

impl ColumnIdentity {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.table, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistogramType {
    #[serde(rename = "equi-height")]
    EquiHeight,
}

impl HistogramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistogramType::EquiHeight => "equi-height",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "equi-height" => Some(HistogramType::EquiHeight),
            _ => None,
        }
    }
}

/// Comparison predicates the optimizer asks a histogram to estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate<T> {
    Equal(T),
    NotEqual(T),
    LessThan(T),
    LessThanOrEqual(T),
    GreaterThan(T),
    GreaterThanOrEqual(T),
    Between(T, T),
    NotBetween(T, T),
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBase {
    identity: ColumnIdentity,
    histogram_type: HistogramType,
    data_type: ValueDataType,
    null_values_fraction: f64,
    sampling_rate: f64,
    num_buckets_specified: usize,
    collation: Collation,
    last_updated: NaiveDateTime,
}

impl HistogramBase {
    pub fn new(
        identity: ColumnIdentity,
        histogram_type: HistogramType,
        data_type: ValueDataType,
    ) -> Self {
        Self {
            identity,
            histogram_type,
            data_type,
            null_values_fraction: INVALID_NULL_VALUES_FRACTION,
            sampling_rate: 1.0,
            num_buckets_specified: 0,
            collation: Collation::default(),
            last_updated: Utc::now().naive_utc(),
        }
    }

    pub fn identity(&self) -> &ColumnIdentity {
        &self.identity
    }

    pub fn histogram_type(&self) -> HistogramType {
        self.histogram_type
    }

    pub fn data_type(&self) -> ValueDataType {
        self.data_type
    }

    pub fn null_values_fraction(&self) -> f64 {
        self.null_values_fraction
    }

    /// Fraction of rows that are not NULL, zero before the first build.
    pub fn non_null_values_frequency(&self) -> f64 {
        if self.null_values_fraction < 0.0 {
            return 0.0;
        }
        1.0 - self.null_values_fraction
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn num_buckets_specified(&self) -> usize {
        self.num_buckets_specified
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn last_updated(&self) -> NaiveDateTime {
        self.last_updated
    }

    /// Resets the per-build fields ahead of a rebuild.
    pub(crate) fn reset_for_build(
        &mut self,
        num_buckets_specified: usize,
        sampling_rate: f64,
        collation: Collation,
    ) {
        self.num_buckets_specified = num_buckets_specified;
        self.null_values_fraction = INVALID_NULL_VALUES_FRACTION;
        self.sampling_rate = sampling_rate;
        self.collation = collation;
        self.last_updated = Utc::now().naive_utc();
    }

    pub(crate) fn set_null_values_fraction(&mut self, fraction: f64) {
        self.null_values_fraction = fraction;
    }

    /// Writes the fields common to all histogram kinds.
    pub(crate) fn histogram_to_json(&self, object: &mut Map<String, Value>) -> Result<()> {
        object.insert(
            KEY_LAST_UPDATED.to_string(),
            Value::String(crate::value::format_datetime(&self.last_updated)),
        );
        object.insert(
            KEY_HISTOGRAM_TYPE.to_string(),
            Value::String(self.histogram_type.as_str().to_string()),
        );
        object.insert(
            KEY_NULL_VALUES.to_string(),
            float_to_json(KEY_NULL_VALUES, self.null_values_fraction)?,
        );
        object.insert(
            KEY_COLLATION_ID.to_string(),
            Value::from(self.collation.id()),
        );
        object.insert(
            KEY_SAMPLING_RATE.to_string(),
            float_to_json(KEY_SAMPLING_RATE, self.sampling_rate)?,
        );
        object.insert(
            KEY_NUM_BUCKETS_SPECIFIED.to_string(),
            Value::from(self.num_buckets_specified as u64),
        );
        Ok(())
    }

    pub(crate) fn histogram_data_type_to_json(&self, object: &mut Map<String, Value>) {
        object.insert(
            KEY_DATA_TYPE.to_string(),
            Value::String(self.data_type.as_str().to_string()),
        );
    }

    /// Reads the common fields back, checking that the document describes a
    /// histogram of this kind and value domain.
    pub(crate) fn json_to_histogram(&mut self, object: &Map<String, Value>) -> Result<()> {
        let (histogram_type, data_type) = read_histogram_kind(object)?;
        if histogram_type != self.histogram_type {
            return Err(HistogramError::Deserialization(format!(
                "histogram type {} does not match {}",
                histogram_type.as_str(),
                self.histogram_type.as_str()
            )));
        }
        if data_type != self.data_type {
            return Err(HistogramError::Deserialization(format!(
                "data type {data_type} does not match {}",
                self.data_type
            )));
        }

        let last_updated = required(object, KEY_LAST_UPDATED)?;
        self.last_updated = last_updated
            .as_str()
            .and_then(crate::value::parse_datetime)
            .ok_or_else(|| field_error(KEY_LAST_UPDATED, last_updated))?;

        let null_values = required(object, KEY_NULL_VALUES)?;
        self.null_values_fraction = null_values
            .as_f64()
            .ok_or_else(|| field_error(KEY_NULL_VALUES, null_values))?;

        let collation_id = required(object, KEY_COLLATION_ID)?;
        self.collation = collation_id
            .as_u64()
            .and_then(Collation::from_id)
            .ok_or_else(|| field_error(KEY_COLLATION_ID, collation_id))?;

        let sampling_rate = required(object, KEY_SAMPLING_RATE)?;
        self.sampling_rate = sampling_rate
            .as_f64()
            .ok_or_else(|| field_error(KEY_SAMPLING_RATE, sampling_rate))?;

        let num_buckets = required(object, KEY_NUM_BUCKETS_SPECIFIED)?;
        self.num_buckets_specified = num_buckets
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| field_error(KEY_NUM_BUCKETS_SPECIFIED, num_buckets))?;
        Ok(())
    }
}

/// Histogram kind and value domain recorded in a JSON document.
pub fn read_histogram_kind(object: &Map<String, Value>) -> Result<(HistogramType, ValueDataType)> {
    let histogram_type = required(object, KEY_HISTOGRAM_TYPE)?;
    let histogram_type = histogram_type
        .as_str()
        .and_then(HistogramType::from_name)
        .ok_or_else(|| field_error(KEY_HISTOGRAM_TYPE, histogram_type))?;
    let data_type = required(object, KEY_DATA_TYPE)?;
    let data_type = data_type
        .as_str()
        .and_then(ValueDataType::from_name)
        .ok_or_else(|| field_error(KEY_DATA_TYPE, data_type))?;
    Ok((histogram_type, data_type))
}

pub(crate) fn required<'j>(object: &'j Map<String, Value>, key: &str) -> Result<&'j Value> {
    object
        .get(key)
        .ok_or_else(|| HistogramError::Deserialization(format!("missing field {key:?}")))
}

fn field_error(key: &str, value: &Value) -> HistogramError {
    HistogramError::Deserialization(format!("invalid value for {key:?}: {value}"))
}

fn float_to_json(key: &str, value: f64) -> Result<Value> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| HistogramError::Serialization(format!("{key} is not finite: {value}")))
}
