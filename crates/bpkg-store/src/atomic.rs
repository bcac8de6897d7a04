//! Atomic whole-file persistence: write to a temp file in the target
//! directory, `fsync`, then rename over the destination. Adapted from the
//! teacher's lockfile writer so a crash or concurrent reader never
//! observes a half-written store file.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{Result, StoreError};

/// Write `contents` to `path` atomically.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(contents).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.flush().map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Acquire an exclusive advisory lock on the store's lock file for the
/// duration of a transaction, mirroring the teacher's use of `fs2` to
/// serialize concurrent lockfile writers across processes.
pub fn lock_exclusive(file: &File) -> Result<()> {
    use fs2::FileExt;
    file.lock_exclusive().map_err(|source| StoreError::Persist {
        path: Path::new("<lockfile>").to_path_buf(),
        source,
    })
}

/// Ensure the parent directory of `path` exists before a first write.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| StoreError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
