//! Gate configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then
//! environment overrides, then CLI flags (applied by the binary).
//!
//! ```toml
//! [detectors]
//! ewma_alpha = 0.2
//!
//! [thresholds]
//! gap_ppm_local = 5.0
//!
//! [input]
//! max_bytes = 134217728
//!
//! [telemetry]
//! out_dir = "artifacts"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::breaker::BreakerThresholds;
use crate::detectors::DEFAULT_EWMA_ALPHA;
use crate::error::ConfigError;
use crate::input::DEFAULT_MAX_BYTES;
use crate::logging::{LogConfig, LogLevel};
use crate::telemetry::TelemetryConfig;

/// Environment variable that overrides `input.max_bytes`.
pub const MAX_REPLAY_BYTES_ENV: &str = "LOB_MAX_REPLAY_BYTES";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Weight of the raw-counter channel in `(0, 1]`.
    pub ewma_alpha: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ewma_alpha: DEFAULT_EWMA_ALPHA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Refuse replay inputs larger than this many bytes.
    pub max_bytes: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub detectors: DetectorConfig,
    pub thresholds: BreakerThresholds,
    pub input: InputConfig,
    pub telemetry: TelemetryConfig,
    pub logging: LogConfig,
}

impl GateConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(shown.clone())
            } else {
                ConfigError::ReadFailed(shown.clone(), e.to_string())
            }
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %shown, "Loaded config");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeFailed(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let alpha = self.detectors.ewma_alpha;
        if !(alpha.is_finite() && alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "detectors.ewma_alpha must be in (0, 1], got {alpha}"
            )));
        }
        self.thresholds.validate()?;
        if self.telemetry.jsonl_file.is_empty() || self.telemetry.prom_file.is_empty() {
            return Err(ConfigError::ValidationError(
                "telemetry file names must not be empty".to_string(),
            ));
        }
        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(ConfigError::ValidationError)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(MAX_REPLAY_BYTES_ENV) {
            self.input.max_bytes = parse_byte_count(MAX_REPLAY_BYTES_ENV, &raw)?;
        }
        Ok(())
    }
}

fn parse_byte_count(name: &str, raw: &str) -> Result<u64, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: raw.to_string(),
        });
    }
    trimmed.parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: raw.to_string(),
    })
}
