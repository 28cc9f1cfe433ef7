//! Detector aggregation: raw quality counters blended with override readings.
//!
//! Each evaluation produces a fresh [`DetectorReadings`] snapshot. Every field
//! is a single-step EWMA blend of two explicit input channels:
//!
//! > reading = alpha * raw + (1 - alpha) * override
//!
//! where `raw` comes from the live counters owned by a [`DetectorAggregator`]
//! and `override` is an externally supplied [`OverrideReadings`] vector.
//!
//! With `alpha = 1` and zero overrides the readings track live counts only.
//! With a small `alpha` the injected overrides dominate, which is how synthetic
//! conditions are replayed deterministically.

use serde::{Deserialize, Serialize};

/// Default blend weight for the raw channel.
pub const DEFAULT_EWMA_ALPHA: f64 = 0.2;

const PPM_SCALE: f64 = 1_000_000.0;

/// Parts-per-million of `part` in `whole`; `0` when `whole == 0`.
#[must_use]
pub fn ppm(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * PPM_SCALE) / whole as f64
}

// =============================================================================
// Value types
// =============================================================================

/// Smoothed per-metric readings consumed by the breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorReadings {
    /// Sequence gap rate (ppm).
    pub gap_rate: f64,
    /// Corrupt message rate (ppm).
    pub corrupt_rate: f64,
    /// Clock skew (ppm).
    pub skew_ppm: f64,
    /// Longest burst duration (ms).
    pub burst_ms: f64,
}

/// Externally injected readings that stand in for, or blend with, raw counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideReadings {
    pub gap_ppm: f64,
    pub corrupt_ppm: f64,
    pub skew_ppm: f64,
    pub burst_ms: f64,
}

impl OverrideReadings {
    #[must_use]
    pub fn new(gap_ppm: f64, corrupt_ppm: f64, skew_ppm: f64, burst_ms: f64) -> Self {
        Self {
            gap_ppm,
            corrupt_ppm,
            skew_ppm,
            burst_ms,
        }
    }
}

/// Raw counters accumulated over one analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorCounters {
    pub total: u64,
    pub gaps: u64,
    pub corrupt: u64,
    /// Running maximum burst duration (ms).
    pub burst_ms: f64,
    /// Latest skew reading (ppm).
    pub skew_ppm: f64,
}

impl DetectorCounters {
    /// Raw channel expressed in reading units.
    #[must_use]
    pub fn raw_readings(&self) -> DetectorReadings {
        DetectorReadings {
            gap_rate: ppm(self.gaps, self.total),
            corrupt_rate: ppm(self.corrupt, self.total),
            skew_ppm: self.skew_ppm,
            burst_ms: self.burst_ms,
        }
    }
}

/// Blend a raw channel with an override channel.
#[must_use]
pub fn blend(alpha: f64, raw: &DetectorReadings, over: &OverrideReadings) -> DetectorReadings {
    let mix = |r: f64, o: f64| alpha * r + (1.0 - alpha) * o;
    DetectorReadings {
        gap_rate: mix(raw.gap_rate, over.gap_ppm),
        corrupt_rate: mix(raw.corrupt_rate, over.corrupt_ppm),
        skew_ppm: mix(raw.skew_ppm, over.skew_ppm),
        burst_ms: mix(raw.burst_ms, over.burst_ms),
    }
}

// =============================================================================
// DetectorAggregator
// =============================================================================

/// Owns the raw counters for one run and the current override vector.
///
/// # Example
///
/// ```ignore
/// let mut det = DetectorAggregator::new(1.0);
/// det.record_total(1_000_000);
/// det.record_gap(6);
/// assert_eq!(det.readings().gap_rate, 6.0);
/// ```
#[derive(Debug, Clone)]
pub struct DetectorAggregator {
    alpha: f64,
    counters: DetectorCounters,
    overrides: OverrideReadings,
}

impl Default for DetectorAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_EWMA_ALPHA)
    }
}

impl DetectorAggregator {
    /// Create an aggregator with the given raw-channel weight.
    ///
    /// `alpha` is clamped into `(0, 1]`; a non-finite value falls back to
    /// [`DEFAULT_EWMA_ALPHA`].
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(f64::MIN_POSITIVE, 1.0)
        } else {
            DEFAULT_EWMA_ALPHA
        };
        Self {
            alpha,
            counters: DetectorCounters::default(),
            overrides: OverrideReadings::default(),
        }
    }

    /// Blend weight of the raw channel.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn record_total(&mut self, n: u64) {
        self.counters.total = self.counters.total.saturating_add(n);
    }

    pub fn record_gap(&mut self, n: u64) {
        self.counters.gaps = self.counters.gaps.saturating_add(n);
    }

    pub fn record_corrupt(&mut self, n: u64) {
        self.counters.corrupt = self.counters.corrupt.saturating_add(n);
    }

    /// Keep the longest burst seen this run.
    pub fn record_burst(&mut self, ms: f64) {
        if ms > self.counters.burst_ms {
            self.counters.burst_ms = ms;
        }
    }

    /// Latest skew wins.
    pub fn record_skew(&mut self, ppm: f64) {
        self.counters.skew_ppm = ppm;
    }

    /// Replace the whole override vector.
    pub fn set_overrides(&mut self, overrides: OverrideReadings) {
        self.overrides = overrides;
    }

    #[must_use]
    pub fn overrides(&self) -> OverrideReadings {
        self.overrides
    }

    #[must_use]
    pub fn counters(&self) -> DetectorCounters {
        self.counters
    }

    /// Blend live counters with the stored overrides.
    #[must_use]
    pub fn readings(&self) -> DetectorReadings {
        self.readings_with(&self.overrides)
    }

    /// Blend live counters with an explicitly supplied override channel.
    #[must_use]
    pub fn readings_with(&self, overrides: &OverrideReadings) -> DetectorReadings {
        blend(self.alpha, &self.counters.raw_readings(), overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ppm_zero_whole_is_zero() {
        assert_eq!(ppm(5, 0), 0.0);
        assert_eq!(ppm(0, 0), 0.0);
    }

    #[test]
    fn ppm_scales_to_million() {
        assert!(approx(ppm(1, 1_000_000), 1.0));
        assert!(approx(ppm(1, 2), 500_000.0));
    }

    #[test]
    fn fresh_aggregator_reads_zero() {
        let det = DetectorAggregator::default();
        assert_eq!(det.readings(), DetectorReadings::default());
    }

    #[test]
    fn alpha_one_tracks_raw_counts_only() {
        let mut det = DetectorAggregator::new(1.0);
        det.record_total(1_000_000);
        det.record_gap(6);
        det.record_corrupt(2);
        det.set_overrides(OverrideReadings::new(999.0, 999.0, 999.0, 999.0));
        let r = det.readings();
        assert!(approx(r.gap_rate, 6.0));
        assert!(approx(r.corrupt_rate, 2.0));
        assert!(approx(r.skew_ppm, 0.0));
        assert!(approx(r.burst_ms, 0.0));
    }

    #[test]
    fn small_alpha_lets_overrides_dominate() {
        let mut det = DetectorAggregator::new(1e-9);
        det.set_overrides(OverrideReadings::new(60.0, 0.0, 0.0, 0.0));
        assert!((det.readings().gap_rate - 60.0).abs() < 1e-6);
    }

    #[test]
    fn default_alpha_blends_both_channels() {
        let mut det = DetectorAggregator::default();
        det.record_total(100);
        det.record_gap(1); // 10_000 ppm raw
        det.set_overrides(OverrideReadings::new(100.0, 0.0, 0.0, 0.0));
        let expected = 0.2 * 10_000.0 + 0.8 * 100.0;
        assert!(approx(det.readings().gap_rate, expected));
    }

    #[test]
    fn burst_keeps_running_max() {
        let mut det = DetectorAggregator::new(1.0);
        det.record_burst(3.0);
        det.record_burst(1.0);
        det.record_burst(2.5);
        assert_eq!(det.counters().burst_ms, 3.0);
        det.record_burst(4.0);
        assert_eq!(det.readings().burst_ms, 4.0);
    }

    #[test]
    fn skew_is_last_write_wins() {
        let mut det = DetectorAggregator::new(1.0);
        det.record_skew(50.0);
        det.record_skew(3.0);
        assert_eq!(det.readings().skew_ppm, 3.0);
    }

    #[test]
    fn counters_accumulate() {
        let mut det = DetectorAggregator::default();
        det.record_total(10);
        det.record_total(5);
        det.record_gap(1);
        det.record_gap(1);
        det.record_corrupt(3);
        let c = det.counters();
        assert_eq!(c.total, 15);
        assert_eq!(c.gaps, 2);
        assert_eq!(c.corrupt, 3);
    }

    #[test]
    fn counters_saturate_instead_of_wrapping() {
        let mut det = DetectorAggregator::default();
        det.record_total(u64::MAX);
        det.record_total(1);
        assert_eq!(det.counters().total, u64::MAX);
    }

    #[test]
    fn readings_do_not_mutate_counters() {
        let mut det = DetectorAggregator::default();
        det.record_total(7);
        det.record_gap(1);
        let before = det.counters();
        let _ = det.readings();
        let _ = det.readings_with(&OverrideReadings::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(det.counters(), before);
    }

    #[test]
    fn set_overrides_replaces_whole_vector() {
        let mut det = DetectorAggregator::default();
        det.set_overrides(OverrideReadings::new(1.0, 2.0, 3.0, 4.0));
        det.set_overrides(OverrideReadings::new(0.0, 0.0, 9.0, 0.0));
        assert_eq!(det.overrides(), OverrideReadings::new(0.0, 0.0, 9.0, 0.0));
    }

    #[test]
    fn readings_with_ignores_stored_overrides() {
        let mut det = DetectorAggregator::new(0.5);
        det.set_overrides(OverrideReadings::new(100.0, 0.0, 0.0, 0.0));
        let r = det.readings_with(&OverrideReadings::new(10.0, 0.0, 0.0, 0.0));
        assert!(approx(r.gap_rate, 5.0));
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(DetectorAggregator::new(5.0).alpha(), 1.0);
        assert!(DetectorAggregator::new(0.0).alpha() > 0.0);
        assert!(DetectorAggregator::new(-1.0).alpha() > 0.0);
        assert_eq!(DetectorAggregator::new(f64::NAN).alpha(), DEFAULT_EWMA_ALPHA);
    }

    #[test]
    fn readings_serde_roundtrip() {
        let r = DetectorReadings {
            gap_rate: 1.5,
            corrupt_rate: 0.25,
            skew_ppm: 7.0,
            burst_ms: 2.0,
        };
        let json = serde_json::to_string(&r).unwrap();
        let back: DetectorReadings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
