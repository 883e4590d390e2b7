use std::cmp::Ordering;

use crate::value::{Collation, HistogramValue};
use crate::{HistogramError, Result};

/// Observed frequency of every distinct non-null value of a column sample.
///
/// Entries are kept sorted ascending under the value domain's order and each
/// distinct value appears once.
#[derive(Debug, Clone)]
pub struct ValueMap<T> {
    entries: Vec<(T, u64)>,
    num_null_values: u64,
    sampling_rate: f64,
    collation: Collation,
}

impl<'a, T: HistogramValue<'a>> ValueMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            num_null_values: 0,
            sampling_rate: 1.0,
            collation: Collation::default(),
        }
    }

    pub fn with_collation(collation: Collation) -> Self {
        Self {
            collation,
            ..Self::new()
        }
    }

    /// Builds a map from raw (possibly repeated) sample values.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut map = Self::new();
        map.add_values(values.into_iter().map(|value| (value, 1)));
        map
    }

    /// Adds `count` occurrences of `value`, merging with an existing entry.
    pub fn add_value(&mut self, value: T, count: u64) {
        if count == 0 {
            return;
        }
        match self
            .entries
            .binary_search_by(|(existing, _)| existing.histogram_cmp(&value))
        {
            Ok(idx) => self.entries[idx].1 += count,
            Err(idx) => self.entries.insert(idx, (value, count)),
        }
    }

    pub fn add_values<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (T, u64)>,
    {
        let mut incoming: Vec<(T, u64)> = values.into_iter().filter(|(_, c)| *c > 0).collect();
        if incoming.len() < 16 {
            for (value, count) in incoming {
                self.add_value(value, count);
            }
            return;
        }
        incoming.extend(self.entries.drain(..));
        incoming.sort_by(|(a, _), (b, _)| a.histogram_cmp(b));
        for (value, count) in incoming {
            match self.entries.last_mut() {
                Some((last, total)) if last.histogram_cmp(&value) == Ordering::Equal => {
                    *total += count;
                }
                _ => self.entries.push((value, count)),
            }
        }
    }

    pub fn add_null_values(&mut self, count: u64) {
        self.num_null_values += count;
    }

    pub fn set_sampling_rate(&mut self, sampling_rate: f64) -> Result<()> {
        if !(sampling_rate > 0.0 && sampling_rate <= 1.0) {
            return Err(HistogramError::InvalidArgument(format!(
                "sampling rate {sampling_rate} outside (0, 1]"
            )));
        }
        self.sampling_rate = sampling_rate;
        Ok(())
    }

    pub fn set_collation(&mut self, collation: Collation) {
        self.collation = collation;
    }

    pub fn entries(&self) -> &[(T, u64)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(T, u64)> + '_ {
        self.entries.iter()
    }

    /// Number of distinct non-null values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_null_values(&self) -> u64 {
        self.num_null_values
    }

    pub fn num_non_null_values(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }
}

impl<'a, T: HistogramValue<'a>> Default for ValueMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
