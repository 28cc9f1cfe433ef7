//! Deterministic synthetic feeds.
//!
//! A feed is `count` pseudo-random `u64` words, little-endian, drawn from a
//! [`StdRng`] seeded with a fixed value. Next to the feed goes its golden
//! digest file (`<feed>.fnv`), which `replay` picks up by default, so a
//! generated pair replays with `determinism=pass`.
//!
//! Same seed and count give byte-identical output for a given `rand` release.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::digest::{Fnv1a64, to_hex};
use crate::error::{ConfigError, Error, Result};
use crate::replay::sidecar_path;

pub const DEFAULT_SEED: u64 = 0xB1_A9C0_FFEE;
pub const DEFAULT_COUNT: u64 = 1_000_000;

const WORD_BYTES: u64 = 8;
const WORDS_PER_CHUNK: u64 = 4096;
const CHUNK_BYTES: usize = 4096 * 8;

/// What one generator run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthSummary {
    pub feed: PathBuf,
    pub golden: PathBuf,
    pub words: u64,
    pub bytes: u64,
    pub digest: u64,
}

/// Stream `count` seeded words into `sink` and return their FNV-1a digest.
pub fn generate_into<W: Write>(sink: &mut W, count: u64, seed: u64) -> io::Result<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut hasher = Fnv1a64::new();
    let mut chunk = Vec::with_capacity(CHUNK_BYTES);
    let mut left = count;
    while left > 0 {
        let n = left.min(WORDS_PER_CHUNK);
        chunk.clear();
        for _ in 0..n {
            chunk.extend_from_slice(&rng.random::<u64>().to_le_bytes());
        }
        hasher.update(&chunk);
        sink.write_all(&chunk)?;
        left -= n;
    }
    Ok(hasher.digest())
}

/// Write a feed to `out` and its golden digest to `<out>.fnv`.
///
/// Missing parent directories are created.
pub fn write_feed(out: &Path, count: u64, seed: u64) -> Result<SynthSummary> {
    let golden = sidecar_path(out);
    if golden == out {
        return Err(ConfigError::ValidationError(format!(
            "output {} would be overwritten by its own .fnv digest; pick another extension",
            out.display()
        ))
        .into());
    }

    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| Error::Write { path, source }
    };

    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(write_err(dir))?;
    }
    let mut writer = BufWriter::new(File::create(out).map_err(write_err(out))?);
    let digest = generate_into(&mut writer, count, seed).map_err(write_err(out))?;
    writer.flush().map_err(write_err(out))?;
    fs::write(&golden, format!("{}\n", to_hex(digest))).map_err(write_err(&golden))?;

    let summary = SynthSummary {
        feed: out.to_path_buf(),
        golden,
        words: count,
        bytes: count.saturating_mul(WORD_BYTES),
        digest,
    };
    tracing::info!(
        feed = %summary.feed.display(),
        words = summary.words,
        seed,
        digest = %to_hex(digest),
        "Synthetic feed written"
    );
    Ok(summary)
}
