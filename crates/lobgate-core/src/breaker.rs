//! Tiered, latching publish breaker.
//!
//! Maps a [`DetectorReadings`] snapshot onto one of five ordered severity
//! tiers. Crossing into `Feeder` or above latches the breaker: it may keep
//! escalating but never de-escalates on its own until an operator calls
//! [`Breaker::clear_latch`], which resets all the way to `Fuse`.
//!
//! `Kill` is never produced by classification. It is an operator override
//! ([`Breaker::trip_kill`]) and is terminal: it survives `clear_latch`.
//!
//! [`Breaker::step`] is branch comparisons only: no allocation, no I/O and no
//! locking. Auditing lives one layer up in [`BreakerJournal`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detectors::DetectorReadings;
use crate::error::ConfigError;

// =============================================================================
// BreakerState
// =============================================================================

/// Severity tier, totally ordered `Fuse < Local < Feeder < Main < Kill`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum BreakerState {
    #[default]
    Fuse = 0,
    Local = 1,
    Feeder = 2,
    Main = 3,
    Kill = 4,
}

impl BreakerState {
    pub const ALL: [Self; 5] = [Self::Fuse, Self::Local, Self::Feeder, Self::Main, Self::Kill];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fuse => "Fuse",
            Self::Local => "Local",
            Self::Feeder => "Feeder",
            Self::Main => "Main",
            Self::Kill => "Kill",
        }
    }

    /// Numeric tier, as exported on the metrics surface.
    #[must_use]
    pub const fn level(self) -> u8 {
        self as u8
    }

    /// Whether downstream publication is allowed in this tier.
    #[must_use]
    pub const fn allows_publish(self) -> bool {
        matches!(self, Self::Fuse | Self::Local)
    }

    /// Whether entering this tier engages the latch.
    #[must_use]
    pub const fn latches(self) -> bool {
        matches!(self, Self::Feeder | Self::Main | Self::Kill)
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown breaker state: {s}. Expected one of: Fuse, Local, Feeder, Main, Kill"
                )
            })
    }
}

// =============================================================================
// Thresholds
// =============================================================================

/// Local/Feeder/Main cutoffs for each of the four metrics.
///
/// Each metric's cutoffs must increase strictly from local to main; see
/// [`BreakerThresholds::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerThresholds {
    pub gap_ppm_local: f64,
    pub gap_ppm_feeder: f64,
    pub gap_ppm_main: f64,
    pub corrupt_ppm_local: f64,
    pub corrupt_ppm_feeder: f64,
    pub corrupt_ppm_main: f64,
    pub skew_ppm_local: f64,
    pub skew_ppm_feeder: f64,
    pub skew_ppm_main: f64,
    pub burst_ms_local: f64,
    pub burst_ms_feeder: f64,
    pub burst_ms_main: f64,
}

impl Default for BreakerThresholds {
    fn default() -> Self {
        Self {
            gap_ppm_local: 5.0,
            gap_ppm_feeder: 50.0,
            gap_ppm_main: 200.0,
            corrupt_ppm_local: 1.0,
            corrupt_ppm_feeder: 10.0,
            corrupt_ppm_main: 50.0,
            skew_ppm_local: 5.0,
            skew_ppm_feeder: 20.0,
            skew_ppm_main: 100.0,
            burst_ms_local: 2.0,
            burst_ms_feeder: 5.0,
            burst_ms_main: 10.0,
        }
    }
}

impl BreakerThresholds {
    /// `(local, feeder, main)` cutoffs for one metric.
    #[must_use]
    pub const fn tiers(&self, metric: Metric) -> (f64, f64, f64) {
        match metric {
            Metric::Gap => (self.gap_ppm_local, self.gap_ppm_feeder, self.gap_ppm_main),
            Metric::Corrupt => (
                self.corrupt_ppm_local,
                self.corrupt_ppm_feeder,
                self.corrupt_ppm_main,
            ),
            Metric::Skew => (self.skew_ppm_local, self.skew_ppm_feeder, self.skew_ppm_main),
            Metric::Burst => (
                self.burst_ms_local,
                self.burst_ms_feeder,
                self.burst_ms_main,
            ),
        }
    }

    /// Check that every metric's cutoffs are finite and strictly increasing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for metric in Metric::ALL {
            let (local, feeder, main) = self.tiers(metric);
            if !(local.is_finite() && feeder.is_finite() && main.is_finite()) {
                return Err(ConfigError::ValidationError(format!(
                    "{} thresholds must be finite",
                    metric.as_str()
                )));
            }
            if !(local < feeder && feeder < main) {
                return Err(ConfigError::ValidationError(format!(
                    "{} thresholds must satisfy local < feeder < main (got {local}, {feeder}, {main})",
                    metric.as_str()
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Classification
// =============================================================================

/// The four gated metrics, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Gap,
    Corrupt,
    Skew,
    Burst,
}

impl Metric {
    pub const ALL: [Self; 4] = [Self::Gap, Self::Corrupt, Self::Skew, Self::Burst];

    /// Reading name as it appears in telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gap => "gap_ppm",
            Self::Corrupt => "corrupt_ppm",
            Self::Skew => "skew_ppm",
            Self::Burst => "burst_ms",
        }
    }

    #[must_use]
    pub const fn value(self, readings: &DetectorReadings) -> f64 {
        match self {
            Self::Gap => readings.gap_rate,
            Self::Corrupt => readings.corrupt_rate,
            Self::Skew => readings.skew_ppm,
            Self::Burst => readings.burst_ms,
        }
    }
}

/// Tier for a single reading. Cutoffs are inclusive lower bounds.
#[must_use]
pub fn classify(value: f64, local: f64, feeder: f64, main: f64) -> BreakerState {
    if value >= main {
        BreakerState::Main
    } else if value >= feeder {
        BreakerState::Feeder
    } else if value >= local {
        BreakerState::Local
    } else {
        BreakerState::Fuse
    }
}

/// Worst tier across all metrics, and the first metric that reached it.
///
/// `metric` is `None` only when every reading is below its local cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub tier: BreakerState,
    pub metric: Option<Metric>,
}

#[must_use]
pub fn classify_readings(
    readings: &DetectorReadings,
    thresholds: &BreakerThresholds,
) -> Classification {
    let mut worst = Classification {
        tier: BreakerState::Fuse,
        metric: None,
    };
    for metric in Metric::ALL {
        let (local, feeder, main) = thresholds.tiers(metric);
        let tier = classify(metric.value(readings), local, feeder, main);
        if tier > worst.tier {
            worst = Classification {
                tier,
                metric: Some(metric),
            };
        }
    }
    worst
}

/// Worst tier across all metrics. Never returns [`BreakerState::Kill`].
#[must_use]
pub fn worst_tier(readings: &DetectorReadings, thresholds: &BreakerThresholds) -> BreakerState {
    classify_readings(readings, thresholds).tier
}

// =============================================================================
// Breaker
// =============================================================================

/// Latching breaker state machine.
#[derive(Debug, Clone)]
pub struct Breaker {
    thresholds: BreakerThresholds,
    state: BreakerState,
    latched: bool,
}

impl Breaker {
    #[must_use]
    pub fn new(thresholds: BreakerThresholds) -> Self {
        Self {
            thresholds,
            state: BreakerState::Fuse,
            latched: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.state
    }

    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    #[must_use]
    pub fn thresholds(&self) -> &BreakerThresholds {
        &self.thresholds
    }

    /// True iff the current tier is `Fuse` or `Local`, regardless of latch.
    #[must_use]
    pub fn publish_allowed(&self) -> bool {
        self.state.allows_publish()
    }

    /// Advance the state machine with one reading snapshot.
    #[inline]
    pub fn step(&mut self, readings: &DetectorReadings) -> BreakerState {
        let desired = worst_tier(readings, &self.thresholds);
        self.apply(desired)
    }

    #[inline]
    fn apply(&mut self, desired: BreakerState) -> BreakerState {
        if self.state == BreakerState::Kill {
            return self.state;
        }
        if self.latched {
            self.state = self.state.max(desired);
        } else {
            self.state = desired;
            self.latched = desired.latches();
        }
        self.state
    }

    /// Operator reset: unlatch and return to `Fuse`, unless killed.
    pub fn clear_latch(&mut self) {
        self.latched = false;
        if self.state != BreakerState::Kill {
            self.state = BreakerState::Fuse;
        }
    }

    /// Operator override into the terminal `Kill` tier.
    pub fn trip_kill(&mut self) {
        self.state = BreakerState::Kill;
        self.latched = true;
    }
}

// =============================================================================
// Transition journal
// =============================================================================

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionCause {
    /// A reading reached a tier cutoff.
    Threshold { metric: Metric, tier: BreakerState },
    /// All readings fell below their local cutoffs while unlatched.
    Nominal,
    /// Operator cleared the latch.
    ClearLatch,
    /// Operator tripped the kill override.
    Kill,
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold { metric, tier } => {
                write!(f, "{}>{}", metric.as_str(), tier.as_str().to_ascii_lowercase())
            }
            Self::Nominal => f.write_str("nominal"),
            Self::ClearLatch => f.write_str("clear_latch"),
            Self::Kill => f.write_str("kill"),
        }
    }
}

/// One state change, keyed by event index rather than wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub event_index: u64,
    pub from: BreakerState,
    pub to: BreakerState,
    pub cause: TransitionCause,
}

impl fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[idx={} {}->{} rule={}]",
            self.event_index, self.from, self.to, self.cause
        )
    }
}

/// Ordered transition records for one breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLog {
    records: Vec<TransitionRecord>,
}

impl TransitionLog {
    #[must_use]
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical text form, one record per line. Two logs are replay-equal
    /// iff their renderings are byte-identical.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.records.len() * 40);
        for record in &self.records {
            out.push_str(&record.to_string());
            out.push('\n');
        }
        out
    }

    fn push(&mut self, record: TransitionRecord) {
        self.records.push(record);
    }
}

/// A [`Breaker`] that records every state change with its event index.
#[derive(Debug, Clone)]
pub struct BreakerJournal {
    name: String,
    breaker: Breaker,
    log: TransitionLog,
    next_index: u64,
}

impl BreakerJournal {
    #[must_use]
    pub fn new(thresholds: BreakerThresholds) -> Self {
        Self::with_name("default", thresholds)
    }

    /// Create a journal with a stable feed name used in log fields.
    #[must_use]
    pub fn with_name(name: impl Into<String>, thresholds: BreakerThresholds) -> Self {
        Self {
            name: name.into(),
            breaker: Breaker::new(thresholds),
            log: TransitionLog::default(),
            next_index: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn breaker(&self) -> &Breaker {
        &self.breaker
    }

    #[must_use]
    pub fn log(&self) -> &TransitionLog {
        &self.log
    }

    #[must_use]
    pub fn into_log(self) -> TransitionLog {
        self.log
    }

    /// Index the next `step` will be recorded under.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Step the breaker and record a transition if the tier changed.
    pub fn step(&mut self, readings: &DetectorReadings) -> BreakerState {
        let index = self.next_index;
        self.next_index += 1;

        let from = self.breaker.state();
        let was_latched = self.breaker.is_latched();
        let class = classify_readings(readings, self.breaker.thresholds());
        let to = self.breaker.apply(class.tier);
        if to != from {
            let cause = match class.metric {
                Some(metric) => TransitionCause::Threshold {
                    metric,
                    tier: class.tier,
                },
                None => TransitionCause::Nominal,
            };
            self.record(index, from, to, cause);
            if !was_latched && self.breaker.is_latched() {
                warn!(
                    feed = %self.name,
                    event_index = index,
                    state = %to,
                    cause = %cause,
                    "Breaker latched; publication gated until cleared"
                );
            } else {
                info!(
                    feed = %self.name,
                    event_index = index,
                    from = %from,
                    to = %to,
                    cause = %cause,
                    "Breaker transition"
                );
            }
        }
        to
    }

    /// Operator reset; recorded against the index of the next event.
    pub fn clear_latch(&mut self) {
        let from = self.breaker.state();
        self.breaker.clear_latch();
        let to = self.breaker.state();
        if to != from {
            self.record(self.next_index, from, to, TransitionCause::ClearLatch);
        }
        info!(feed = %self.name, state = %to, "Breaker latch cleared");
    }

    /// Operator kill override.
    pub fn trip_kill(&mut self) {
        let from = self.breaker.state();
        self.breaker.trip_kill();
        if from != BreakerState::Kill {
            self.record(self.next_index, from, BreakerState::Kill, TransitionCause::Kill);
        }
        warn!(feed = %self.name, from = %from, "Breaker kill override tripped");
    }

    fn record(
        &mut self,
        event_index: u64,
        from: BreakerState,
        to: BreakerState,
        cause: TransitionCause,
    ) {
        self.log.push(TransitionRecord {
            event_index,
            from,
            to,
            cause,
        });
    }
}
