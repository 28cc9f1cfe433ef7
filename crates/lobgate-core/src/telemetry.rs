//! Per-cycle telemetry snapshot and its sinks.
//!
//! A [`TelemetrySnapshot`] is the immutable result of one evaluation cycle:
//! determinism verdict, latency percentiles, detector readings and the
//! breaker decision. [`SnapshotRecorder`] assembles it and fans it out to
//! every registered [`TelemetrySink`]; the recorder itself does no I/O.
//!
//! Two sinks ship with the crate:
//!
//! - [`JsonlSink`] appends one JSON object per snapshot.
//! - [`PromSink`] overwrites a Prometheus text-exposition file with the latest
//!   values.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::Result;
use crate::breaker::{Breaker, BreakerState};
use crate::detectors::DetectorReadings;
use crate::digest::to_hex;
use crate::tail_latency::PercentileSet;

// =============================================================================
// Configuration
// =============================================================================

/// Where telemetry goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Directory holding both sink files. Created on demand.
    pub out_dir: PathBuf,
    /// JSONL file name inside `out_dir`.
    pub jsonl_file: String,
    /// Prometheus text file name inside `out_dir`.
    pub prom_file: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("artifacts"),
            jsonl_file: "telemetry.jsonl".to_string(),
            prom_file: "metrics.prom".to_string(),
        }
    }
}

impl TelemetryConfig {
    #[must_use]
    pub fn jsonl_path(&self) -> PathBuf {
        self.out_dir.join(&self.jsonl_file)
    }

    #[must_use]
    pub fn prom_path(&self) -> PathBuf {
        self.out_dir.join(&self.prom_file)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Immutable record of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Input identifier, usually the replayed file path.
    pub input: String,
    /// Expected digest, when one was supplied. Without it determinism is
    /// unchecked and never reported as a pass.
    pub golden_digest: Option<u64>,
    pub actual_digest: u64,
    pub determinism_pass: bool,
    pub percentiles: PercentileSet,
    pub cpu_pin: Option<usize>,
    pub readings: DetectorReadings,
    pub breaker: BreakerState,
    pub publish_allowed: bool,
}

// =============================================================================
// Sinks
// =============================================================================

/// Destination for snapshots.
pub trait TelemetrySink {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Write one snapshot stamped with `ts`.
    fn write(&mut self, snapshot: &TelemetrySnapshot, ts: &str) -> Result<()>;
}

/// `serde_json` writes non-finite floats as `null`; read them back as NaN.
fn f64_or_nan<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(de)?.unwrap_or(f64::NAN))
}

/// One line of the JSONL sink.
///
/// `golden` is `null` when no expected digest was supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonlRecord {
    pub ts: String,
    pub input: String,
    pub golden: Option<String>,
    pub actual: String,
    pub determinism: bool,
    #[serde(deserialize_with = "f64_or_nan")]
    pub p50_ms: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub p95_ms: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub p99_ms: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub p999_ms: f64,
    pub p999_valid: bool,
    #[serde(deserialize_with = "f64_or_nan")]
    pub p9999_ms: f64,
    pub p9999_valid: bool,
    #[serde(deserialize_with = "f64_or_nan")]
    pub gap_ppm: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub corrupt_ppm: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub skew_ppm: f64,
    #[serde(deserialize_with = "f64_or_nan")]
    pub burst_ms: f64,
    pub breaker: BreakerState,
    pub publish: bool,
    pub cpu_pin: Option<usize>,
}

impl JsonlRecord {
    #[must_use]
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, ts: &str) -> Self {
        let p = &snapshot.percentiles;
        let r = &snapshot.readings;
        Self {
            ts: ts.to_string(),
            input: snapshot.input.clone(),
            golden: snapshot.golden_digest.map(to_hex),
            actual: to_hex(snapshot.actual_digest),
            determinism: snapshot.determinism_pass,
            p50_ms: p.p50,
            p95_ms: p.p95,
            p99_ms: p.p99,
            p999_ms: p.p999,
            p999_valid: p.p999_valid,
            p9999_ms: p.p9999,
            p9999_valid: p.p9999_valid,
            gap_ppm: r.gap_rate,
            corrupt_ppm: r.corrupt_rate,
            skew_ppm: r.skew_ppm,
            burst_ms: r.burst_ms,
            breaker: snapshot.breaker,
            publish: snapshot.publish_allowed,
            cpu_pin: snapshot.cpu_pin,
        }
    }
}

/// Append-only JSON-lines sink.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonlSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn write(&mut self, snapshot: &TelemetrySnapshot, ts: &str) -> Result<()> {
        let mut line = serde_json::to_vec(&JsonlRecord::from_snapshot(snapshot, ts))?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Re-read every record from a JSONL sink file. Blank lines are skipped.
///
/// Non-finite readings were written as `null` and come back as NaN.
pub fn read_jsonl(path: &Path) -> Result<Vec<JsonlRecord>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Prometheus text-exposition sink. Each write replaces the file.
#[derive(Debug, Clone)]
pub struct PromSink {
    path: PathBuf,
}

impl PromSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the exposition text for one snapshot.
    #[must_use]
    pub fn render(snapshot: &TelemetrySnapshot) -> String {
        let p = &snapshot.percentiles;
        let r = &snapshot.readings;
        let mut out = String::with_capacity(384);
        let mut line = |name: &str, value: String| {
            out.push_str(name);
            out.push(' ');
            out.push_str(&value);
            out.push('\n');
        };
        line("lob_p50_ms", p.p50.to_string());
        line("lob_p95_ms", p.p95.to_string());
        line("lob_p99_ms", p.p99.to_string());
        if p.p999_valid {
            line("lob_p999_ms", p.p999.to_string());
        }
        if p.p9999_valid {
            line("lob_p9999_ms", p.p9999.to_string());
        }
        line("lob_gap_ppm", r.gap_rate.to_string());
        line("lob_corrupt_ppm", r.corrupt_rate.to_string());
        line("lob_skew_ppm", r.skew_ppm.to_string());
        line("lob_burst_ms", r.burst_ms.to_string());
        line("lob_breaker_state", snapshot.breaker.level().to_string());
        line(
            "lob_publish_allowed",
            u8::from(snapshot.publish_allowed).to_string(),
        );
        if let Some(cpu) = snapshot.cpu_pin {
            line("lob_cpu_pin", cpu.to_string());
        }
        out
    }
}

impl TelemetrySink for PromSink {
    fn name(&self) -> &'static str {
        "prom"
    }

    fn write(&mut self, snapshot: &TelemetrySnapshot, _ts: &str) -> Result<()> {
        fs::write(&self.path, Self::render(snapshot))?;
        Ok(())
    }
}

// =============================================================================
// Recorder
// =============================================================================

/// Assembles snapshots and hands them to the registered sinks.
#[derive(Default)]
pub struct SnapshotRecorder {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl std::fmt::Debug for SnapshotRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("SnapshotRecorder")
            .field("sinks", &names)
            .finish()
    }
}

impl SnapshotRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder with both file sinks under `config.out_dir`, which is created
    /// if missing.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        ensure_dir(&config.out_dir)?;
        Ok(Self::new()
            .with_sink(JsonlSink::new(config.jsonl_path()))
            .with_sink(PromSink::new(config.prom_path())))
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Build a snapshot from one cycle's results. Pure.
    #[must_use]
    pub fn assemble(
        input: impl Into<String>,
        golden_digest: Option<u64>,
        actual_digest: u64,
        percentiles: PercentileSet,
        cpu_pin: Option<usize>,
        readings: DetectorReadings,
        breaker: &Breaker,
    ) -> TelemetrySnapshot {
        TelemetrySnapshot {
            input: input.into(),
            golden_digest,
            actual_digest,
            determinism_pass: golden_digest == Some(actual_digest),
            percentiles,
            cpu_pin,
            readings,
            breaker: breaker.state(),
            publish_allowed: breaker.publish_allowed(),
        }
    }

    /// Write `snapshot` to every sink, stamped with the current local time.
    pub fn record(&mut self, snapshot: &TelemetrySnapshot) -> Result<()> {
        let ts = now_iso8601();
        self.record_at(snapshot, &ts)
    }

    /// Write `snapshot` to every sink with an explicit timestamp.
    ///
    /// Stops at the first failing sink.
    pub fn record_at(&mut self, snapshot: &TelemetrySnapshot, ts: &str) -> Result<()> {
        for sink in &mut self.sinks {
            sink.write(snapshot, ts)?;
            tracing::debug!(sink = sink.name(), input = %snapshot.input, "Snapshot written");
        }
        Ok(())
    }
}

/// Create `path` and any missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Local time as `%Y-%m-%dT%H:%M:%S%z`.
#[must_use]
pub fn now_iso8601() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string()
}
