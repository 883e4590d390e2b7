use serde::{Deserialize, Serialize};

use crate::{HistogramError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    /// Upper bound on the number of buckets a build may produce.
    pub num_buckets: usize,
    /// Run the invariant checks after every build and load and fail on a
    /// violation instead of only logging it.
    pub strict_validation: bool,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            num_buckets: 100,
            strict_validation: cfg!(debug_assertions),
        }
    }
}

impl HistogramConfig {
    pub fn with_num_buckets(num_buckets: usize) -> Self {
        Self {
            num_buckets,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_buckets < 1 {
            return Err(HistogramError::InvalidArgument(
                "number of buckets must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
