//! Histograms whose value domain is only known at run time, e.g. when loading
//! a stored document.

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::arena::Arena;
use crate::config::HistogramConfig;
use crate::equi_height::EquiHeight;
use crate::histogram::{read_histogram_kind, ColumnIdentity, HistogramBase, HistogramType};
use crate::value::{CollatedStr, Decimal, ValueDataType};
use crate::{HistogramError, Result};

#[derive(Debug)]
pub enum EquiHeightHistogram<'a> {
    Double(EquiHeight<'a, f64>),
    String(EquiHeight<'a, CollatedStr<'a>>),
    Uint(EquiHeight<'a, u64>),
    Int(EquiHeight<'a, i64>),
    Datetime(EquiHeight<'a, NaiveDateTime>),
    Decimal(EquiHeight<'a, Decimal>),
}

macro_rules! dispatch {
    ($histogram:expr, $inner:ident => $body:expr) => {
        match $histogram {
            EquiHeightHistogram::Double($inner) => $body,
            EquiHeightHistogram::String($inner) => $body,
            EquiHeightHistogram::Uint($inner) => $body,
            EquiHeightHistogram::Int($inner) => $body,
            EquiHeightHistogram::Datetime($inner) => $body,
            EquiHeightHistogram::Decimal($inner) => $body,
        }
    };
}

macro_rules! impl_from_typed {
    ($($variant:ident => $value:ty),* $(,)?) => {
        $(
            impl<'a> From<EquiHeight<'a, $value>> for EquiHeightHistogram<'a> {
                fn from(histogram: EquiHeight<'a, $value>) -> Self {
                    EquiHeightHistogram::$variant(histogram)
                }
            }
        )*
    };
}

impl_from_typed!(
    Double => f64,
    String => CollatedStr<'a>,
    Uint => u64,
    Int => i64,
    Datetime => NaiveDateTime,
    Decimal => Decimal,
);

impl<'a> EquiHeightHistogram<'a> {
    /// Loads a stored histogram, picking the value domain from its
    /// `"data-type"` field.
    pub fn from_json(arena: &'a Arena, identity: ColumnIdentity, json: &Value) -> Result<Self> {
        Self::from_json_with_config(arena, identity, json, &HistogramConfig::default())
    }

    pub fn from_json_with_config(
        arena: &'a Arena,
        identity: ColumnIdentity,
        json: &Value,
        config: &HistogramConfig,
    ) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            HistogramError::Deserialization("histogram document is not an object".to_string())
        })?;
        let (histogram_type, data_type) = read_histogram_kind(object)?;
        let HistogramType::EquiHeight = histogram_type;
        Ok(match data_type {
            ValueDataType::Double => {
                EquiHeight::<f64>::from_json_with_config(arena, identity, json, config)?.into()
            }
            ValueDataType::String => {
                EquiHeight::<CollatedStr<'a>>::from_json_with_config(arena, identity, json, config)?
                    .into()
            }
            ValueDataType::Uint => {
                EquiHeight::<u64>::from_json_with_config(arena, identity, json, config)?.into()
            }
            ValueDataType::Int => {
                EquiHeight::<i64>::from_json_with_config(arena, identity, json, config)?.into()
            }
            ValueDataType::Datetime => {
                EquiHeight::<NaiveDateTime>::from_json_with_config(arena, identity, json, config)?
                    .into()
            }
            ValueDataType::Decimal => {
                EquiHeight::<Decimal>::from_json_with_config(arena, identity, json, config)?.into()
            }
        })
    }

    pub fn to_json(&self) -> Result<Value> {
        dispatch!(self, histogram => histogram.histogram_to_json())
    }

    pub fn clone_in<'b>(&self, arena: &'b Arena) -> Result<EquiHeightHistogram<'b>> {
        Ok(match self {
            EquiHeightHistogram::Double(h) => EquiHeightHistogram::Double(h.clone_in(arena)?),
            EquiHeightHistogram::String(h) => EquiHeightHistogram::String(h.clone_in(arena)?),
            EquiHeightHistogram::Uint(h) => EquiHeightHistogram::Uint(h.clone_in(arena)?),
            EquiHeightHistogram::Int(h) => EquiHeightHistogram::Int(h.clone_in(arena)?),
            EquiHeightHistogram::Datetime(h) => EquiHeightHistogram::Datetime(h.clone_in(arena)?),
            EquiHeightHistogram::Decimal(h) => EquiHeightHistogram::Decimal(h.clone_in(arena)?),
        })
    }

    pub fn base(&self) -> &HistogramBase {
        dispatch!(self, histogram => histogram.base())
    }

    pub fn identity(&self) -> &ColumnIdentity {
        self.base().identity()
    }

    pub fn data_type(&self) -> ValueDataType {
        self.base().data_type()
    }

    pub fn num_buckets(&self) -> usize {
        dispatch!(self, histogram => histogram.num_buckets())
    }

    pub fn num_distinct_values(&self) -> u64 {
        dispatch!(self, histogram => histogram.num_distinct_values())
    }

    pub fn null_values_fraction(&self) -> f64 {
        self.base().null_values_fraction()
    }

    pub fn validate(&self) -> Result<()> {
        dispatch!(self, histogram => histogram.validate())
    }
}
