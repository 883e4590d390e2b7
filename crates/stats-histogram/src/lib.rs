//! Equi-height histograms for column statistics.
//!
//! A histogram is built once from an ordered value frequency map, frozen into
//! an arena-backed bucket slice and then queried read-only by the optimizer
//! for equality and range selectivity. Histograms persist as JSON documents.

use thiserror::Error;

pub mod arena;
pub mod bucket;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod equi_height;
pub mod histogram;
pub mod value;
pub mod value_map;

pub use arena::Arena;
pub use bucket::Bucket;
pub use catalog::{
    FileHistogramCatalog, HistogramCatalog, InMemoryHistogramCatalog, StatisticsError,
    StoredHistogram,
};
pub use config::HistogramConfig;
pub use dispatch::EquiHeightHistogram;
pub use equi_height::EquiHeight;
pub use histogram::{
    ColumnIdentity, HistogramBase, HistogramType, Predicate, INVALID_NULL_VALUES_FRACTION,
};
pub use value::{Collation, CollatedStr, Decimal, HistogramValue, ValueDataType};
pub use value_map::ValueMap;

pub(crate) const LOG_TARGET: &str = "stats::histogram";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistogramError {
    #[error("arena allocation failed")]
    Allocation,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("histogram invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, HistogramError>;
