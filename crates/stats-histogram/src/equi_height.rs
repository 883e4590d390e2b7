//! Equi-height histogram.
//!
//! Buckets are sized so that each holds roughly the same number of rows. The
//! bucket slice lives in an [`Arena`] and is never mutated once built, so a
//! built histogram can be shared by concurrent readers.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::arena::{push_reserved, Arena};
use crate::bucket::Bucket;
use crate::config::HistogramConfig;
use crate::histogram::{
    required, ColumnIdentity, HistogramBase, HistogramType, Predicate, KEY_BUCKETS,
};
use crate::value::HistogramValue;
use crate::value_map::ValueMap;
use crate::{HistogramError, Result, LOG_TARGET};

/// Below this sampling rate the per-bucket distinct count is corrected for
/// values the sample is likely to have missed.
const DISTINCT_ESTIMATOR_THRESHOLD: f64 = 0.8;

#[derive(Debug)]
pub struct EquiHeight<'a, T> {
    base: HistogramBase,
    buckets: &'a [Bucket<T>],
}

impl<'a, T: HistogramValue<'a>> EquiHeight<'a, T> {
    /// Empty histogram for `identity`; populate it with
    /// [`build_histogram`](Self::build_histogram) or [`from_json`](Self::from_json).
    pub fn create(identity: ColumnIdentity) -> Self {
        Self {
            base: HistogramBase::new(identity, HistogramType::EquiHeight, T::DATA_TYPE),
            buckets: Default::default(),
        }
    }

    /// Creates and builds a histogram in one step, validating the result when
    /// the configuration asks for it.
    pub fn build(
        arena: &'a Arena,
        identity: ColumnIdentity,
        value_map: &ValueMap<T>,
        config: &HistogramConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut histogram = Self::create(identity);
        histogram.build_histogram(arena, value_map, config.num_buckets)?;
        if config.strict_validation {
            histogram.validate()?;
        }
        Ok(histogram)
    }

    /// Rebuilds the buckets from `value_map` using at most `num_buckets` buckets.
    ///
    /// Values are walked in ascending order. A bucket is closed once adding the
    /// next value would overshoot the running threshold and stopping here is at
    /// least as close to it, or once the remaining values are needed to fill
    /// the remaining bucket slots. When the budget covers every distinct value,
    /// each value gets a singleton bucket.
    pub fn build_histogram(
        &mut self,
        arena: &'a Arena,
        value_map: &ValueMap<T>,
        num_buckets: usize,
    ) -> Result<()> {
        if num_buckets < 1 {
            return Err(HistogramError::InvalidArgument(
                "number of buckets must be at least 1".to_string(),
            ));
        }
        if let Some((value, _)) = value_map.iter().find(|(value, _)| !value.is_encodable()) {
            return Err(HistogramError::InvalidArgument(format!(
                "value {value:?} cannot be stored in a histogram"
            )));
        }

        self.buckets = Default::default();
        self.base.reset_for_build(
            num_buckets,
            value_map.sampling_rate(),
            value_map.collation(),
        );

        let num_non_null_values = value_map.num_non_null_values();
        let num_null_values = value_map.num_null_values();
        if num_non_null_values == 0 {
            let fraction = if num_null_values > 0 { 1.0 } else { 0.0 };
            self.base.set_null_values_fraction(fraction);
            log::debug!(
                target: LOG_TARGET,
                "histogram_built column={} buckets=0 null_fraction={}",
                self.base.identity(),
                fraction
            );
            return Ok(());
        }

        let total_count = num_null_values + num_non_null_values;
        self.base
            .set_null_values_fraction(num_null_values as f64 / total_count as f64);

        let avg_bucket_size = num_non_null_values as f64 / num_buckets as f64;
        let mut current_threshold = avg_bucket_size;

        let mut buckets = arena.vec_with_capacity(num_buckets)?;

        let entries = value_map.entries();
        let sampling_rate = value_map.sampling_rate();
        let mut cumulative_sum: u64 = 0;
        let mut sum: u64 = 0;
        let mut num_distinct: u64 = 0;
        let mut num_singlecount_values: u64 = 0;
        let mut values_remaining = entries.len();
        let mut lowest_value = 0;
        // Enough budget for every distinct value to get its own bucket.
        let one_bucket_per_value = entries.len() <= num_buckets;

        for (idx, (value, count)) in entries.iter().enumerate() {
            if *count == 1 {
                num_singlecount_values += 1;
            }
            sum += count;
            cumulative_sum += count;
            num_distinct += 1;
            values_remaining -= 1;

            let next = entries.get(idx + 1).filter(|_| !one_bucket_per_value);
            if let Some((_, next_count)) = next {
                let with_next = cumulative_sum + next_count;
                if with_next as f64 > current_threshold {
                    let current_distance = (current_threshold - cumulative_sum as f64).abs();
                    let next_distance = (current_threshold - with_next as f64).abs();
                    if current_distance > next_distance {
                        continue;
                    }
                } else if values_remaining >= num_buckets.saturating_sub(buckets.len()) {
                    continue;
                }
            }

            let cumulative_frequency = cumulative_sum as f64 / total_count as f64;
            let num_distinct_estimate = if sampling_rate < DISTINCT_ESTIMATOR_THRESHOLD {
                estimate_num_distinct(num_distinct, num_singlecount_values, sum, sampling_rate)
            } else {
                num_distinct
            };

            let bucket = Bucket::new(
                entries[lowest_value].0,
                *value,
                cumulative_frequency,
                num_distinct_estimate,
            );
            debug_assert!(!bucket.upper_inclusive().histogram_lt(bucket.lower_inclusive()));
            debug_assert!(buckets.last().map_or(true, |previous: &Bucket<T>| {
                previous.upper_inclusive().histogram_lt(bucket.lower_inclusive())
            }));
            push_reserved(&mut buckets, bucket)?;

            num_singlecount_values = 0;
            sum = 0;
            num_distinct = 0;
            current_threshold = avg_bucket_size * (buckets.len() + 1) as f64;
            lowest_value = idx + 1;
        }

        debug_assert!(buckets.len() <= num_buckets);
        self.buckets = buckets.into_bump_slice();
        log::debug!(
            target: LOG_TARGET,
            "histogram_built column={} buckets={} requested={} null_fraction={} sampling_rate={}",
            self.base.identity(),
            self.buckets.len(),
            num_buckets,
            self.base.null_values_fraction(),
            sampling_rate
        );
        Ok(())
    }

    pub fn base(&self) -> &HistogramBase {
        &self.base
    }

    pub fn buckets(&self) -> &'a [Bucket<T>] {
        self.buckets
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn num_buckets_specified(&self) -> usize {
        self.base.num_buckets_specified()
    }

    pub fn null_values_fraction(&self) -> f64 {
        self.base.null_values_fraction()
    }

    pub fn non_null_values_frequency(&self) -> f64 {
        self.base.non_null_values_frequency()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.base.sampling_rate()
    }

    pub fn histogram_type_name(&self) -> &'static str {
        self.base.histogram_type().as_str()
    }

    /// Estimated distinct non-null values over all buckets.
    pub fn num_distinct_values(&self) -> u64 {
        self.buckets.iter().map(Bucket::num_distinct).sum()
    }

    /// Frequency of the bucket at `idx` alone, not cumulative.
    fn bucket_frequency(&self, idx: usize) -> f64 {
        let cumulative = self.buckets[idx].cumulative_frequency();
        match idx.checked_sub(1) {
            Some(previous) => cumulative - self.buckets[previous].cumulative_frequency(),
            None => cumulative,
        }
    }

    /// First bucket whose upper bound is not below `value`.
    fn lower_bound(&self, value: &T) -> usize {
        self.buckets
            .partition_point(|bucket| bucket.upper_inclusive().histogram_lt(value))
    }

    /// First bucket whose upper bound is above `value`.
    fn upper_bound(&self, value: &T) -> usize {
        self.buckets
            .partition_point(|bucket| !value.histogram_lt(bucket.upper_inclusive()))
    }

    /// Estimated fraction of rows with `column = value`.
    pub fn equal_to_selectivity(&self, value: &T) -> f64 {
        let found = self.lower_bound(value);
        let Some(bucket) = self.buckets.get(found) else {
            return 0.0;
        };
        // Before the first bucket or in a gap between two buckets.
        if value.histogram_lt(bucket.lower_inclusive()) {
            return 0.0;
        }
        let bucket_frequency = self.bucket_frequency(found);
        debug_assert!(bucket_frequency >= 0.0);
        bucket_frequency / bucket.num_distinct().max(1) as f64
    }

    /// Estimated fraction of rows with `column < value`.
    pub fn less_than_selectivity(&self, value: &T) -> f64 {
        let found = self.lower_bound(value);
        let Some(bucket) = self.buckets.get(found) else {
            return self.non_null_values_frequency();
        };
        let previous_cumulative_frequency = match found.checked_sub(1) {
            Some(previous) => self.buckets[previous].cumulative_frequency(),
            None => 0.0,
        };

        // lower < value <= upper: the bucket is not a singleton and contributes
        // the part of its frequency that lies below `value`. Otherwise
        // value <= lower and it contributes nothing.
        if bucket.lower_inclusive().histogram_lt(value) {
            let distance = bucket.distance_from_lower(value);
            debug_assert!((0.0..=1.0).contains(&distance));
            previous_cumulative_frequency + self.bucket_frequency(found) * distance
        } else {
            previous_cumulative_frequency
        }
    }

    /// Estimated fraction of rows with `column > value`.
    pub fn greater_than_selectivity(&self, value: &T) -> f64 {
        let found = self.upper_bound(value);
        let Some(bucket) = self.buckets.get(found) else {
            return 0.0;
        };
        let found_bucket_frequency = self.bucket_frequency(found);
        let next_buckets_frequency =
            self.non_null_values_frequency() - bucket.cumulative_frequency();

        // value < lower: the whole bucket counts. Otherwise lower <= value < upper
        // and only the part above `value` does.
        if value.histogram_lt(bucket.lower_inclusive()) {
            found_bucket_frequency + next_buckets_frequency
        } else {
            let distance = bucket.distance_from_upper(value);
            debug_assert!((0.0..=1.0).contains(&distance));
            distance * found_bucket_frequency + next_buckets_frequency
        }
    }

    /// Selectivity of a comparison predicate, clamped to `[0, 1]`.
    pub fn selectivity(&self, predicate: &Predicate<T>) -> f64 {
        let non_null = self.non_null_values_frequency();
        let selectivity = match predicate {
            Predicate::Equal(value) => self.equal_to_selectivity(value),
            Predicate::NotEqual(value) => non_null - self.equal_to_selectivity(value),
            Predicate::LessThan(value) => self.less_than_selectivity(value),
            Predicate::LessThanOrEqual(value) => {
                self.less_than_selectivity(value) + self.equal_to_selectivity(value)
            }
            Predicate::GreaterThan(value) => self.greater_than_selectivity(value),
            Predicate::GreaterThanOrEqual(value) => {
                self.greater_than_selectivity(value) + self.equal_to_selectivity(value)
            }
            Predicate::Between(low, high) => self.between_selectivity(low, high),
            Predicate::NotBetween(low, high) => non_null - self.between_selectivity(low, high),
            Predicate::IsNull => self.null_values_fraction(),
            Predicate::IsNotNull => non_null,
        };
        selectivity.clamp(0.0, 1.0)
    }

    fn between_selectivity(&self, low: &T, high: &T) -> f64 {
        if high.histogram_lt(low) {
            return 0.0;
        }
        let outside = self.less_than_selectivity(low) + self.greater_than_selectivity(high);
        (self.non_null_values_frequency() - outside).max(0.0)
    }

    /// Checks the bucket invariants: bounds ordered inside each bucket, buckets
    /// sorted and non-overlapping, cumulative frequency strictly increasing and
    /// ending at the non-null frequency, and the bucket budget respected.
    pub fn validate(&self) -> Result<()> {
        let violation = |message: String| {
            log::warn!(
                target: LOG_TARGET,
                "histogram_invariant_violated column={} reason={}",
                self.base.identity(),
                message
            );
            Err(HistogramError::InvariantViolation(message))
        };

        for (idx, bucket) in self.buckets.iter().enumerate() {
            if bucket.upper_inclusive().histogram_lt(bucket.lower_inclusive()) {
                return violation(format!("bucket {idx} has upper bound below lower bound"));
            }
            if bucket.num_distinct() == 0 {
                return violation(format!("bucket {idx} has no distinct values"));
            }
            if !(bucket.cumulative_frequency() > 0.0 && bucket.cumulative_frequency() <= 1.0) {
                return violation(format!(
                    "bucket {idx} has cumulative frequency {}",
                    bucket.cumulative_frequency()
                ));
            }
        }
        for (idx, pair) in self.buckets.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            if !previous
                .upper_inclusive()
                .histogram_lt(current.lower_inclusive())
            {
                return violation(format!("bucket {} overlaps bucket {idx}", idx + 1));
            }
            if current.cumulative_frequency() <= previous.cumulative_frequency() {
                return violation(format!(
                    "cumulative frequency does not increase at bucket {}",
                    idx + 1
                ));
            }
        }
        if let Some(last) = self.buckets.last() {
            let expected = self.non_null_values_frequency();
            if (last.cumulative_frequency() - expected).abs() > 1e-9 {
                return violation(format!(
                    "last cumulative frequency {} differs from non-null frequency {expected}",
                    last.cumulative_frequency()
                ));
            }
        }
        let specified = self.base.num_buckets_specified();
        if self.buckets.len() > specified {
            return violation(format!(
                "{} buckets exceed the {specified} specified",
                self.buckets.len()
            ));
        }
        Ok(())
    }

    /// JSON document with the common histogram fields and the buckets.
    pub fn histogram_to_json(&self) -> Result<Value> {
        let mut object = Map::new();
        self.base.histogram_to_json(&mut object)?;

        let buckets = self
            .buckets
            .iter()
            .map(Bucket::bucket_to_json)
            .collect::<Result<Vec<_>>>()?;
        object.insert(KEY_BUCKETS.to_string(), Value::Array(buckets));

        self.base.histogram_data_type_to_json(&mut object);
        Ok(Value::Object(object))
    }

    /// Restores a histogram written by [`histogram_to_json`](Self::histogram_to_json).
    pub fn from_json(arena: &'a Arena, identity: ColumnIdentity, json: &Value) -> Result<Self> {
        Self::from_json_with_config(arena, identity, json, &HistogramConfig::default())
    }

    pub fn from_json_with_config(
        arena: &'a Arena,
        identity: ColumnIdentity,
        json: &Value,
        config: &HistogramConfig,
    ) -> Result<Self> {
        let mut histogram = Self::create(identity);
        histogram.json_to_histogram(arena, json)?;
        if config.strict_validation {
            histogram.validate()?;
        } else if !histogram.is_sorted() {
            log::warn!(
                target: LOG_TARGET,
                "histogram_buckets_unsorted column={}",
                histogram.base.identity()
            );
        }
        Ok(histogram)
    }

    /// Replaces the contents of `self` with the histogram in `json`. Buckets are
    /// taken in array order; the document is expected to come from
    /// [`histogram_to_json`](Self::histogram_to_json).
    pub fn json_to_histogram(&mut self, arena: &'a Arena, json: &Value) -> Result<()> {
        let object = json.as_object().ok_or_else(|| {
            HistogramError::Deserialization("histogram document is not an object".to_string())
        })?;
        self.base.json_to_histogram(object)?;

        let buckets_json = required(object, KEY_BUCKETS)?;
        let buckets_json = buckets_json.as_array().ok_or_else(|| {
            HistogramError::Deserialization(format!("\"{KEY_BUCKETS}\" is not an array"))
        })?;

        let collation = self.base.collation();
        let mut buckets = arena.vec_with_capacity(buckets_json.len())?;
        for bucket_json in buckets_json {
            let bucket = Bucket::bucket_from_json(bucket_json, arena, collation)?;
            push_reserved(&mut buckets, bucket)?;
        }
        self.buckets = buckets.into_bump_slice();
        log::debug!(
            target: LOG_TARGET,
            "histogram_loaded column={} buckets={}",
            self.base.identity(),
            self.buckets.len()
        );
        Ok(())
    }

    fn is_sorted(&self) -> bool {
        self.buckets.windows(2).all(|pair| {
            pair[0]
                .upper_inclusive()
                .histogram_cmp(pair[1].upper_inclusive())
                != Ordering::Greater
        })
    }

    /// Independent copy of this histogram whose buckets, and any string
    /// payloads they reference, live in `arena`.
    pub fn clone_in<'b>(&self, arena: &'b Arena) -> Result<EquiHeight<'b, T::InArena<'b>>> {
        let mut buckets = arena.vec_with_capacity(self.buckets.len())?;
        for bucket in self.buckets {
            push_reserved(&mut buckets, bucket.clone_in(arena)?)?;
        }
        log::debug!(
            target: LOG_TARGET,
            "histogram_cloned column={} buckets={}",
            self.base.identity(),
            buckets.len()
        );
        Ok(EquiHeight {
            base: self.base.clone(),
            buckets: buckets.into_bump_slice(),
        })
    }
}

/// Unsmoothed first-order jackknife estimate of the distinct values in a
/// bucket, given how many of them were seen exactly once in the sample.
fn estimate_num_distinct(
    num_distinct: u64,
    num_singlecount_values: u64,
    sum: u64,
    sampling_rate: f64,
) -> u64 {
    let missed_fraction = (1.0 - sampling_rate) * num_singlecount_values as f64 / sum as f64;
    let estimate = (num_distinct as f64 / (1.0 - missed_fraction)).round();
    if estimate.is_finite() {
        (estimate as u64).max(num_distinct)
    } else {
        num_distinct
    }
}
