//! Size-guarded whole-file reads.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::InputError;

/// Default guard on replay input size (128 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 128 * 1024 * 1024;

/// Read `path` into memory, refusing anything larger than `max_bytes`.
///
/// The size is checked from metadata first, then enforced again while
/// reading so a file that grows between the two steps is still refused.
pub fn read_bounded(path: &Path, max_bytes: u64) -> Result<Vec<u8>, InputError> {
    let io_err = |source: io::Error| InputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(InputError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(io_err(e)),
    };

    let size = file.metadata().map_err(io_err)?.len();
    if size > max_bytes {
        return Err(InputError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    let mut buf = Vec::with_capacity(size as usize);
    file.take(max_bytes.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(io_err)?;
    if buf.len() as u64 > max_bytes {
        return Err(InputError::TooLarge {
            size: buf.len() as u64,
            max: max_bytes,
        });
    }

    tracing::debug!(path = %path.display(), bytes = buf.len(), "Input loaded");
    Ok(buf)
}
