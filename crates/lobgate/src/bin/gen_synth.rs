//! lobgate-gen-synth - write a seeded synthetic feed and its golden digest
//!
//! `lobgate --input <out>` then replays the pair with `determinism=pass`.
//!
//! Exit codes:
//! - `0`: feed and `<out>.fnv` written
//! - `1`: invalid argument
//! - `2`: output could not be written

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use lobgate_core::digest::to_hex;
use lobgate_core::error::format_error_with_remediation;
use lobgate_core::logging::{LogConfig, LogError, init_logging};
use lobgate_core::synth::{DEFAULT_COUNT, DEFAULT_SEED, write_feed};

const EXIT_INVALID_ARGUMENT: u8 = 1;
const EXIT_IO: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "lobgate-gen-synth",
    version,
    about = "Write a deterministic synthetic feed and its .fnv golden digest"
)]
struct Cli {
    /// Number of u64 words to write
    #[arg(long, default_value_t = DEFAULT_COUNT)]
    count: u64,

    /// Output feed; the digest goes next to it with a .fnv extension
    #[arg(long, value_name = "PATH", default_value = "data/golden/itch_1m.bin")]
    out: PathBuf,

    /// RNG seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOBGATE_LOG_LEVEL", default_value = "info")]
    log_level: String,
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

    let logging = LogConfig {
        level: cli.log_level.clone(),
        ..LogConfig::default()
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("Error: {err}");
        return match err {
            LogError::InvalidLevel(_) => ExitCode::from(EXIT_INVALID_ARGUMENT),
            _ => ExitCode::from(EXIT_IO),
        };
    }

    match write_feed(&cli.out, cli.count, cli.seed) {
        Ok(summary) => {
            println!(
                "wrote {} ({} words, {} bytes) digest_fnv=0x{}",
                summary.feed.display(),
                summary.words,
                summary.bytes,
                to_hex(summary.digest)
            );
            println!("golden: {}", summary.golden.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", format_error_with_remediation(&err));
            ExitCode::from(if err.is_config() {
                EXIT_INVALID_ARGUMENT
            } else {
                EXIT_IO
            })
        }
    }
}
