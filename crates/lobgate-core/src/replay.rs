//! One evaluation cycle over a recorded input.
//!
//! The input is split into fixed 64-byte events. Each event is hashed into
//! the running digest, counted, and followed by one breaker decision; the
//! wall time of that per-event work is one latency sample. A trailing partial
//! event is still processed but counted as corrupt.
//!
//! At the end the digest is compared against the golden digest, if there is
//! one, and the results are assembled into a [`TelemetrySnapshot`]. Without
//! a golden digest determinism is unchecked and the snapshot does not claim a
//! pass.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::Result;
use crate::affinity::pin_current_thread;
use crate::breaker::{BreakerJournal, BreakerThresholds, TransitionLog};
use crate::detectors::{DEFAULT_EWMA_ALPHA, DetectorAggregator, DetectorCounters, OverrideReadings};
use crate::digest::{Fnv1a64, parse_hex_digest};
use crate::input::{DEFAULT_MAX_BYTES, read_bounded};
use crate::tail_latency::LatencySamples;
use crate::telemetry::{SnapshotRecorder, TelemetrySnapshot};

/// Size of one replayed event.
pub const EVENT_SIZE: usize = 64;

/// Golden digest files hold a single hex string.
const GOLDEN_FILE_MAX_BYTES: u64 = 1024;

/// Extension of the golden digest file kept next to a feed.
pub const GOLDEN_EXTENSION: &str = "fnv";

/// Where the expected digest comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GoldenSource {
    /// Digest supplied directly.
    Digest(u64),
    /// File containing the digest as hex.
    File(PathBuf),
    /// `<input>.fnv` next to the input, when it exists.
    #[default]
    Sidecar,
    /// No expected digest.
    Unchecked,
}

/// Golden digest file that belongs to `input`: same stem, `.fnv` extension.
#[must_use]
pub fn sidecar_path(input: &Path) -> PathBuf {
    input.with_extension(GOLDEN_EXTENSION)
}

/// Settings for one replay.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub input: PathBuf,
    pub max_bytes: u64,
    pub overrides: OverrideReadings,
    pub ewma_alpha: f64,
    pub thresholds: BreakerThresholds,
    pub golden: GoldenSource,
    pub cpu_pin: Option<usize>,
}

impl ReplayOptions {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            overrides: OverrideReadings::default(),
            ewma_alpha: DEFAULT_EWMA_ALPHA,
            thresholds: BreakerThresholds::default(),
            golden: GoldenSource::Sidecar,
            cpu_pin: None,
        }
    }
}

/// Everything one replay produced.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub snapshot: TelemetrySnapshot,
    pub transitions: TransitionLog,
    pub events: u64,
    pub counters: DetectorCounters,
}

/// Read the input, pin if asked, and evaluate it.
pub fn run(options: &ReplayOptions) -> Result<ReplayOutcome> {
    let bytes = read_bounded(&options.input, options.max_bytes)?;
    let golden = match &options.golden {
        GoldenSource::Digest(d) => Some(*d),
        GoldenSource::File(path) => Some(read_golden_file(path)?),
        GoldenSource::Sidecar => {
            let path = sidecar_path(&options.input);
            if path != options.input && path.is_file() {
                Some(read_golden_file(&path)?)
            } else {
                None
            }
        }
        GoldenSource::Unchecked => None,
    };
    if let Some(cpu) = options.cpu_pin {
        pin_current_thread(cpu)?;
    }
    let outcome = evaluate(&options.input.display().to_string(), &bytes, golden, options);
    tracing::info!(
        input = %outcome.snapshot.input,
        events = outcome.events,
        breaker = %outcome.snapshot.breaker,
        publish = outcome.snapshot.publish_allowed,
        golden_checked = golden.is_some(),
        determinism = outcome.snapshot.determinism_pass,
        "Replay complete"
    );
    Ok(outcome)
}

fn read_golden_file(path: &Path) -> Result<u64> {
    let raw = read_bounded(path, GOLDEN_FILE_MAX_BYTES)?;
    Ok(parse_hex_digest(&String::from_utf8_lossy(&raw))?)
}

/// Evaluate already-loaded bytes. No I/O.
///
/// `golden = None` leaves determinism unchecked.
#[must_use]
pub fn evaluate(
    input_id: &str,
    bytes: &[u8],
    golden: Option<u64>,
    options: &ReplayOptions,
) -> ReplayOutcome {
    let mut detectors = DetectorAggregator::new(options.ewma_alpha);
    detectors.set_overrides(options.overrides);
    let mut journal = BreakerJournal::with_name(input_id, options.thresholds);
    let mut hasher = Fnv1a64::new();
    let mut latencies = LatencySamples::with_capacity(bytes.len().div_ceil(EVENT_SIZE));

    for event in bytes.chunks(EVENT_SIZE) {
        let start = Instant::now();
        hasher.update(event);
        detectors.record_total(1);
        if event.len() < EVENT_SIZE {
            detectors.record_corrupt(1);
        }
        journal.step(&detectors.readings());
        latencies.record(start.elapsed().as_secs_f64() * 1_000.0);
    }

    let events = journal.next_index();
    let actual = hasher.digest();
    let readings = detectors.readings();
    let snapshot = SnapshotRecorder::assemble(
        input_id,
        golden,
        actual,
        latencies.into_percentiles(),
        options.cpu_pin,
        readings,
        journal.breaker(),
    );
    ReplayOutcome {
        snapshot,
        transitions: journal.into_log(),
        events,
        counters: detectors.counters(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use crate::digest::fnv1a64;
    use crate::error::{ConfigError, Error, InputError};

    fn opts() -> ReplayOptions {
        ReplayOptions::new("mem")
    }

    #[test]
    fn empty_input_is_fuse() {
        let out = evaluate("mem", &[], Some(fnv1a64(&[])), &opts());
        assert_eq!(out.events, 0);
        assert!(out.snapshot.determinism_pass);
        assert_eq!(out.snapshot.breaker, BreakerState::Fuse);
        assert_eq!(out.snapshot.percentiles.sample_count, 0);
        assert!(out.transitions.is_empty());
    }

    #[test]
    fn counts_whole_events() {
        let data = vec![7u8; EVENT_SIZE * 10];
        let out = evaluate("mem", &data, None, &opts());
        assert_eq!(out.events, 10);
        assert_eq!(out.counters.total, 10);
        assert_eq!(out.counters.corrupt, 0);
        assert_eq!(out.snapshot.percentiles.sample_count, 10);
        assert_eq!(out.snapshot.actual_digest, fnv1a64(&data));
    }

    #[test]
    fn trailing_partial_event_counts_as_corrupt() {
        let data = vec![1u8; EVENT_SIZE * 3 + 5];
        let out = evaluate("mem", &data, None, &opts());
        assert_eq!(out.events, 4);
        assert_eq!(out.counters.corrupt, 1);
        // 1 corrupt in 4 is far past the main cutoff even after blending.
        assert_eq!(out.snapshot.breaker, BreakerState::Main);
        assert!(!out.snapshot.publish_allowed);
    }

    #[test]
    fn golden_mismatch_fails_determinism() {
        let data = vec![0u8; EVENT_SIZE];
        let out = evaluate("mem", &data, Some(0), &opts());
        assert!(!out.snapshot.determinism_pass);
        assert_eq!(out.snapshot.golden_digest, Some(0));
    }

    #[test]
    fn missing_golden_does_not_claim_a_pass() {
        for len in [0, 10, 5_000] {
            let data = vec![0x5au8; len];
            let out = evaluate("mem", &data, None, &opts());
            assert_eq!(out.snapshot.golden_digest, None);
            assert_eq!(out.snapshot.actual_digest, fnv1a64(&data));
            assert!(!out.snapshot.determinism_pass, "len {len}");
        }
    }

    #[test]
    fn sidecar_golden_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("feed.bin");
        let data = vec![9u8; EVENT_SIZE * 3];
        std::fs::write(&input, &data).unwrap();

        let out = run(&ReplayOptions::new(&input)).unwrap();
        assert_eq!(out.snapshot.golden_digest, None);
        assert!(!out.snapshot.determinism_pass);

        assert_eq!(sidecar_path(&input), dir.path().join("feed.fnv"));
        std::fs::write(sidecar_path(&input), format!("{:016x}\n", fnv1a64(&data))).unwrap();
        let out = run(&ReplayOptions::new(&input)).unwrap();
        assert!(out.snapshot.determinism_pass);

        let mut o = ReplayOptions::new(&input);
        o.golden = GoldenSource::Unchecked;
        assert!(!run(&o).unwrap().snapshot.determinism_pass);
    }

    #[test]
    fn overrides_drive_the_breaker() {
        let mut o = opts();
        o.ewma_alpha = 1e-9;
        o.overrides = OverrideReadings::new(60.0, 0.0, 0.0, 0.0);
        let out = evaluate("mem", &[0u8; EVENT_SIZE * 4], None, &o);
        assert_eq!(out.snapshot.breaker, BreakerState::Feeder);
        assert_eq!(out.transitions.len(), 1);
        assert_eq!(out.transitions.records()[0].event_index, 0);
    }

    #[test]
    fn evaluate_is_deterministic_apart_from_timing() {
        let data: Vec<u8> = (0..=255u8).cycle().take(EVENT_SIZE * 50 + 9).collect();
        let a = evaluate("mem", &data, None, &opts());
        let b = evaluate("mem", &data, None, &opts());
        assert_eq!(a.transitions.render(), b.transitions.render());
        assert_eq!(a.snapshot.actual_digest, b.snapshot.actual_digest);
        assert_eq!(a.snapshot.readings, b.snapshot.readings);
    }

    #[test]
    fn run_reads_golden_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("feed.bin");
        let golden = dir.path().join("feed.fnv");
        let data = vec![3u8; EVENT_SIZE * 2];
        std::fs::write(&input, &data).unwrap();
        std::fs::write(&golden, format!("0x{:016x}\n", fnv1a64(&data))).unwrap();

        let mut o = ReplayOptions::new(&input);
        o.golden = GoldenSource::File(golden);
        let out = run(&o).unwrap();
        assert!(out.snapshot.determinism_pass);
    }

    #[test]
    fn run_rejects_bad_golden_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("feed.bin");
        let golden = dir.path().join("feed.fnv");
        std::fs::write(&input, [0u8; 8]).unwrap();
        std::fs::write(&golden, "not hex").unwrap();

        let mut o = ReplayOptions::new(&input);
        o.golden = GoldenSource::File(golden);
        assert!(matches!(
            run(&o).unwrap_err(),
            Error::Config(ConfigError::InvalidDigest(_))
        ));
    }

    #[test]
    fn run_honours_size_guard() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("feed.bin");
        std::fs::write(&input, [0u8; 200]).unwrap();
        let mut o = ReplayOptions::new(&input);
        o.max_bytes = 128;
        assert!(matches!(
            run(&o).unwrap_err(),
            Error::Input(InputError::TooLarge { size: 200, max: 128 })
        ));
    }
}
