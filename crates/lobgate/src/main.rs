//! lobgate - replay a recorded feed, gate publication, emit telemetry
//!
//! Exit codes:
//! - `0`: replay completed and telemetry was written
//! - `1`: invalid argument or configuration
//! - `2`: input could not be read, or telemetry could not be written

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use lobgate_core::config::GateConfig;
use lobgate_core::detectors::OverrideReadings;
use lobgate_core::digest::{parse_hex_digest, to_hex};
use lobgate_core::error::{ConfigError, format_error_with_remediation};
use lobgate_core::logging::{LogFormat, init_logging};
use lobgate_core::replay::{self, GoldenSource, ReplayOptions};
use lobgate_core::telemetry::{JsonlRecord, SnapshotRecorder, now_iso8601};

const EXIT_INVALID_ARGUMENT: u8 = 1;
const EXIT_IO: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "lobgate", version, about = "Latching publish gate for market-data quality signals")]
struct Cli {
    /// Recorded feed to replay
    #[arg(long, value_name = "PATH", required_unless_present = "print_config")]
    input: Option<PathBuf>,

    /// Injected gap rate (ppm)
    #[arg(long, default_value_t = 0.0)]
    gap_ppm: f64,

    /// Injected corrupt-message rate (ppm)
    #[arg(long, default_value_t = 0.0)]
    corrupt_ppm: f64,

    /// Injected clock skew (ppm)
    #[arg(long, default_value_t = 0.0)]
    skew_ppm: f64,

    /// Injected burst duration (ms)
    #[arg(long, default_value_t = 0.0)]
    burst_ms: f64,

    /// Raw-counter weight in the detector blend, in (0, 1]
    #[arg(long)]
    ewma_alpha: Option<f64>,

    /// Pin the replay thread to this CPU
    #[arg(long, value_name = "N")]
    cpu_pin: Option<usize>,

    /// Expected FNV-1a digest as hex
    #[arg(long, value_name = "HEX", conflicts_with = "golden_file")]
    golden: Option<String>,

    /// File containing the expected digest [default: <input>.fnv when present]
    #[arg(long, value_name = "PATH")]
    golden_file: Option<PathBuf>,

    /// TOML config file
    #[arg(long, value_name = "PATH", env = "LOBGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Telemetry output directory
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Input size guard in bytes (overrides LOB_MAX_REPLAY_BYTES)
    #[arg(long, value_name = "N")]
    max_bytes: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOBGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Also append logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the snapshot as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_INVALID_ARGUMENT),
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(core) = err.downcast_ref::<lobgate_core::Error>() {
                eprintln!("{}", format_error_with_remediation(core));
                let code = if core.is_config() {
                    EXIT_INVALID_ARGUMENT
                } else {
                    EXIT_IO
                };
                ExitCode::from(code)
            } else {
                eprintln!("Error: {err:#}");
                ExitCode::from(EXIT_IO)
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = effective_config(&cli)?;

    if cli.print_config {
        let text = config.to_toml().map_err(lobgate_core::Error::from)?;
        print!("{text}");
        return Ok(());
    }

    init_logging(&config.logging).context("failed to initialize logging")?;

    let options = replay_options(&cli, &config)?;
    let outcome = replay::run(&options)?;
    for record in outcome.transitions.records() {
        tracing::debug!(transition = %record, "Journal");
    }

    let mut recorder = SnapshotRecorder::from_config(&config.telemetry)?;
    let ts = now_iso8601();
    recorder.record_at(&outcome.snapshot, &ts)?;

    let snap = &outcome.snapshot;
    let determinism = match snap.golden_digest {
        None => "unchecked",
        Some(_) if snap.determinism_pass => "pass",
        Some(golden) => {
            tracing::warn!(
                golden = %to_hex(golden),
                actual = %to_hex(snap.actual_digest),
                "Golden digest mismatch"
            );
            "FAIL"
        }
    };

    if cli.json {
        let record = JsonlRecord::from_snapshot(snap, &ts);
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "lobgate: {} events, breaker={} publish={}",
            outcome.events, snap.breaker, snap.publish_allowed
        );
        println!(
            "digest_fnv=0x{} determinism={determinism}",
            to_hex(snap.actual_digest)
        );
        println!(
            "p50_ms={} p95_ms={} p99_ms={}",
            snap.percentiles.p50, snap.percentiles.p95, snap.percentiles.p99
        );
        println!(
            "telemetry: {} {}",
            config.telemetry.jsonl_path().display(),
            config.telemetry.prom_path().display()
        );
    }
    Ok(())
}

/// Defaults, then config file, then environment, then flags.
fn effective_config(cli: &Cli) -> Result<GateConfig, lobgate_core::Error> {
    let mut config = match &cli.config {
        Some(path) => GateConfig::load_from(path)?,
        None => GateConfig::default(),
    };
    config.apply_env_overrides()?;

    if let Some(max) = cli.max_bytes {
        config.input.max_bytes = max;
    }
    if let Some(alpha) = cli.ewma_alpha {
        config.detectors.ewma_alpha = alpha;
    }
    if let Some(dir) = &cli.out_dir {
        config.telemetry.out_dir.clone_from(dir);
    }
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if cli.log_file.is_some() {
        config.logging.file.clone_from(&cli.log_file);
    }
    config.validate()?;
    Ok(config)
}

fn replay_options(cli: &Cli, config: &GateConfig) -> Result<ReplayOptions, lobgate_core::Error> {
    let overrides = OverrideReadings::new(cli.gap_ppm, cli.corrupt_ppm, cli.skew_ppm, cli.burst_ms);
    for (name, value) in [
        ("--gap-ppm", overrides.gap_ppm),
        ("--corrupt-ppm", overrides.corrupt_ppm),
        ("--skew-ppm", overrides.skew_ppm),
        ("--burst-ms", overrides.burst_ms),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be a finite non-negative number, got {value}"
            ))
            .into());
        }
    }

    let golden = match (&cli.golden, &cli.golden_file) {
        (Some(hex), _) => GoldenSource::Digest(parse_hex_digest(hex)?),
        (None, Some(path)) => GoldenSource::File(path.clone()),
        (None, None) => GoldenSource::Sidecar,
    };

    let input = cli.input.clone().ok_or_else(|| {
        ConfigError::ValidationError("--input is required".to_string())
    })?;

    Ok(ReplayOptions {
        input,
        max_bytes: config.input.max_bytes,
        overrides,
        ewma_alpha: config.detectors.ewma_alpha,
        thresholds: config.thresholds,
        golden,
        cpu_pin: cli.cpu_pin,
    })
}
