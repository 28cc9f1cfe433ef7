//! Error types for lobgate-core
//!
//! Only the collaborators around the gating core can fail. The breaker, the
//! detector aggregator and the tail-latency engine are total functions and
//! never appear here.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Remediation command for resolving an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemediationCommand {
    /// Short label describing the command purpose
    pub label: String,
    /// Command to run
    pub command: String,
}

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Suggested commands to resolve or diagnose the issue
    pub commands: Vec<RemediationCommand>,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// Add a command
    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(RemediationCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.commands.is_empty() {
            let _ = writeln!(output, "  Commands:");
            for cmd in &self.commands {
                let _ = writeln!(output, "    - {}: {}", cmd.label, cmd.command);
            }
        }

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lobgate-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Bounded input read errors
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// CPU pinning errors
    #[error("Affinity error: {0}")]
    Affinity(#[from] AffinityError),

    /// Telemetry sink I/O errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generated feed could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Config(err) => Some(err.remediation()),
            Self::Input(err) => Some(err.remediation()),
            Self::Affinity(err) => Some(err.remediation()),
            Self::Telemetry(_) => Some(
                Remediation::new("Check that the telemetry directory is writable, then retry.")
                    .command("Check permissions", "ls -ld artifacts")
                    .alternative("Pass --out-dir pointing at a writable directory."),
            ),
            Self::Json(_) => None,
            Self::Write { path, .. } => Some(
                Remediation::new("Check that the output directory is writable, then retry.")
                    .command("Check permissions", format!("ls -ld \"{}\"", parent_dir(path))),
            ),
        }
    }

    /// Whether this error belongs to the configuration class (bad flag, bad
    /// number, bad config file, unusable `--cpu-pin`) rather than the I/O
    /// class.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Affinity(AffinityError::InvalidCpu { .. } | AffinityError::Unsupported)
        )
    }
}

fn parent_dir(path: &Path) -> String {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.display().to_string(),
        _ => ".".to_string(),
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },

    #[error("Invalid digest {0:?}: expected 16 hex digits")]
    InvalidDigest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::FileNotFound(path) => Remediation::new(format!(
                "Config file not found: {path}. Verify the path and retry."
            ))
            .command("Check path", format!("ls -l \"{path}\""))
            .alternative("Pass --config with the correct path."),
            Self::ReadFailed(path, _) => Remediation::new(format!(
                "Failed to read config file: {path}. Check permissions."
            ))
            .command("Check permissions", format!("ls -l \"{path}\"")),
            Self::ParseFailed(_) => {
                Remediation::new("Config parse failed. Fix the TOML syntax and retry.")
                    .alternative("Start from the defaults printed by `lobgate --print-config`.")
            }
            Self::SerializeFailed(_) => Remediation::new(
                "Config serialization failed. Check that every threshold is a finite number.",
            ),
            Self::InvalidEnv { name, .. } => Remediation::new(format!(
                "{name} must be a plain decimal integer."
            ))
            .command("Unset", format!("unset {name}")),
            Self::InvalidDigest(_) => Remediation::new(
                "Pass the golden digest as 16 lowercase hex digits, optionally prefixed with 0x.",
            ),
            Self::ValidationError(_) => Remediation::new(
                "Config validation failed. Thresholds must increase local < feeder < main.",
            )
            .alternative("Remove the [thresholds] table to fall back to defaults."),
        }
    }
}

/// Bounded file reader errors
#[derive(Error, Debug)]
pub enum InputError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("file too large (guard): {size} bytes exceeds limit of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InputError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::NotFound(path) => Remediation::new(format!(
                "Input file {} does not exist.",
                path.display()
            ))
            .command("Check path", format!("ls -l \"{}\"", path.display())),
            Self::TooLarge { max, .. } => Remediation::new(format!(
                "Input exceeds the {max}-byte guard."
            ))
            .command("Raise guard", "export LOB_MAX_REPLAY_BYTES=<bytes>")
            .alternative("Pass --max-bytes for a one-off run."),
            Self::Io { path, .. } => Remediation::new(format!(
                "Could not read {}. Check permissions.",
                path.display()
            ))
            .command("Check permissions", format!("ls -l \"{}\"", path.display())),
        }
    }
}

/// CPU affinity errors
#[derive(Error, Debug)]
pub enum AffinityError {
    #[error("cpu index {cpu} is out of range")]
    InvalidCpu { cpu: usize },

    #[error("sched_setaffinity failed for cpu {cpu}: {reason}")]
    Syscall { cpu: usize, reason: String },

    #[error("cpu pinning is not supported on this platform")]
    Unsupported,
}

impl AffinityError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::InvalidCpu { .. } | Self::Syscall { .. } => {
                Remediation::new("Pick a CPU index this process is allowed to run on.")
                    .command("List CPUs", "nproc")
                    .alternative("Omit --cpu-pin to run unpinned.")
            }
            Self::Unsupported => Remediation::new("Omit --cpu-pin on this platform."),
        }
    }
}

/// Format an error with remediation guidance for display.
#[must_use]
pub fn format_error_with_remediation(error: &Error) -> String {
    let mut output = format!("Error: {error}");
    if let Some(remediation) = error.remediation() {
        output.push('\n');
        output.push('\n');
        output.push_str(&remediation.render_plain());
    }
    output
}
