//! lobgate-core: Core library for lobgate
//!
//! Decides, for a stream of market-data quality signals, whether downstream
//! publication is safe, and records that decision so it can be audited and
//! replayed.
//!
//! # Architecture
//!
//! ```text
//! raw counters ─┐
//!               ├─→ DetectorAggregator ─→ readings ─→ Breaker::step ─→ state, publish
//! overrides ────┘
//!
//! event timings ─→ PercentileSet ───────────────────────┐
//!                                                         ├─→ TelemetrySnapshot ─→ sinks
//! digest vs golden ─→ determinism ───────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `detectors`: EWMA blend of raw counters and override readings
//! - `breaker`: tiered latching breaker and its transition journal
//! - `tail_latency`: interpolated percentiles with validity gates
//! - `telemetry`: snapshot assembly, JSONL and Prometheus sinks
//! - `digest`: FNV-1a replay digest
//! - `input`: size-guarded file reads
//! - `affinity`: CPU pinning
//! - `replay`: one evaluation cycle over a recorded input
//! - `synth`: seeded synthetic feeds with their golden digest
//! - `config`: TOML configuration and environment overrides
//! - `logging`: `tracing` subscriber setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod affinity;
pub mod breaker;
pub mod config;
pub mod detectors;
pub mod digest;
pub mod error;
pub mod input;
pub mod logging;
pub mod replay;
pub mod synth;
pub mod tail_latency;
pub mod telemetry;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
