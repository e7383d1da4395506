//! Limit parameters.

use std::time::Duration;

use rand::Rng;

use crate::error::{FloodgateError, Result};

/// Windowing algorithm for a limit.
///
/// The discriminants are the tags the batch script dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Independent windows starting at the first count
    FixedWindow = 1,
    /// Weighted sum over two adjacent sub-windows
    SlidingWindow = 2,
}

impl Algorithm {
    pub(crate) fn tag(self) -> i64 {
        self as i64
    }
}

/// Immutable description of one limit: key prefix, algorithm, rate,
/// window size, and maximum count.
///
/// Built with [`Limit::new`] and refined with the `with_*` methods:
///
/// ```
/// use std::time::Duration;
/// use floodgate::Limit;
///
/// let limit = Limit::new(Duration::from_secs(1), 100)
///     .with_name("login")
///     .with_sliding_window();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub(crate) prefix: String,
    pub(crate) algorithm: Algorithm,
    pub(crate) rate: i64,
    pub(crate) size_ms: i64,
    pub(crate) limit: i64,
}

impl Limit {
    /// New limit admitting at most `limit` counted units per window of
    /// `size`, truncated to whole milliseconds.
    ///
    /// Defaults: fixed window algorithm, rate 1, and a pseudo-random key
    /// prefix, so unrelated limiters sharing a store do not collide by
    /// accident.
    pub fn new(size: Duration, limit: u64) -> Self {
        Self {
            prefix: random_prefix(),
            algorithm: Algorithm::FixedWindow,
            rate: 1,
            size_ms: size.as_millis() as i64,
            limit: limit as i64,
        }
    }

    /// Name the limit; every store key is prefixed with `name:`.
    pub fn with_name(mut self, name: &str) -> Self {
        self.prefix = format!("{name}:");
        self
    }

    /// Set the increment applied on each application of the limit.
    /// A rate of zero counts as one.
    pub fn with_rate(mut self, rate: u64) -> Self {
        self.rate = rate.max(1) as i64;
        self
    }

    /// Select the fixed window algorithm (the default).
    pub fn with_fixed_window(mut self) -> Self {
        self.algorithm = Algorithm::FixedWindow;
        self
    }

    /// Select the sliding window algorithm.
    pub fn with_sliding_window(mut self) -> Self {
        self.algorithm = Algorithm::SlidingWindow;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.size_ms < 1 {
            return Err(FloodgateError::InvalidSize);
        }
        if self.limit < 1 {
            return Err(FloodgateError::InvalidLimit);
        }
        Ok(())
    }
}

/// Process-unique default prefix for unnamed limits.
fn random_prefix() -> String {
    let mut rng = rand::thread_rng();
    format!("{}:", rng.gen::<u64>())
}
