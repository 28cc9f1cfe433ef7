//! Tail-latency percentiles over per-event timings.
//!
//! Percentiles use linear interpolation between the two nearest ranks of the
//! ascending-sorted samples. Extreme percentiles carry a validity flag: p99.9
//! needs at least [`P999_MIN_SAMPLES`] samples and p99.99 needs at least
//! [`P9999_MIN_SAMPLES`]. Below that the value is reported as `0` and the flag
//! is `false`; interpolating the far tail of a small sample says nothing.
//!
//! Nothing here panics on malformed input. NaN and negative samples are
//! ordered with [`f64::total_cmp`] and passed through unchanged.

use serde::{Deserialize, Serialize};

/// Minimum sample count for a valid p99.9.
pub const P999_MIN_SAMPLES: usize = 1_000;
/// Minimum sample count for a valid p99.99.
pub const P9999_MIN_SAMPLES: usize = 10_000;

/// Percentile of an already ascending-sorted slice.
///
/// `pct` is on the 0-100 scale. Empty input yields `0`.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    let Some(&first) = sorted.first() else {
        return 0.0;
    };
    let last = sorted[sorted.len() - 1];
    if pct <= 0.0 {
        return first;
    }
    if pct >= 100.0 {
        return last;
    }

    let idx = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = (idx.ceil() as usize).min(sorted.len() - 1);
    let lo_val = sorted[lo.min(sorted.len() - 1)];
    if lo == hi {
        return lo_val;
    }
    let frac = idx - lo as f64;
    lo_val + (sorted[hi] - lo_val) * frac
}

/// Percentile of unsorted samples. Sorts a copy.
#[must_use]
pub fn percentile(samples: &[f64], pct: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, pct)
}

/// The fixed percentile set reported per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileSet {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub p999_valid: bool,
    pub p9999: f64,
    pub p9999_valid: bool,
    pub sample_count: usize,
}

impl PercentileSet {
    /// Sort once and compute every percentile from the same ordering.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted)
    }

    #[must_use]
    pub fn from_sorted(sorted: &[f64]) -> Self {
        let n = sorted.len();
        let p999_valid = n >= P999_MIN_SAMPLES;
        let p9999_valid = n >= P9999_MIN_SAMPLES;
        Self {
            p50: percentile_sorted(sorted, 50.0),
            p95: percentile_sorted(sorted, 95.0),
            p99: percentile_sorted(sorted, 99.0),
            p999: if p999_valid {
                percentile_sorted(sorted, 99.9)
            } else {
                0.0
            },
            p999_valid,
            p9999: if p9999_valid {
                percentile_sorted(sorted, 99.99)
            } else {
                0.0
            },
            p9999_valid,
            sample_count: n,
        }
    }
}

/// Append-only collector of per-event timings in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct LatencySamples {
    samples: Vec<f64>,
}

impl LatencySamples {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, ms: f64) {
        self.samples.push(ms);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    /// Consume the collector, sorting in place instead of copying.
    #[must_use]
    pub fn into_percentiles(mut self) -> PercentileSet {
        self.samples.sort_by(f64::total_cmp);
        PercentileSet::from_sorted(&self.samples)
    }
}
