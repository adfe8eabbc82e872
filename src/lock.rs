//! Concurrency guard (component F): an advisory, per-location file
//! lock. Opens `.lock` under `<data_dir>` and calls
//! `fs2::FileExt::lock_exclusive`; releases on every exit path via
//! `Drop` (RAII), including unwind.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Error, Result};

/// Holds the exclusive lock on a `DataLocation` directory for as long
/// as it is alive. Dropping it releases the lock unconditionally.
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Create the directory if needed and block until the exclusive
    /// lock on `<dir>/.lock` is acquired.
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()
            .map_err(|e| Error::Lock(format!("failed to lock {}: {e}", path.display())))?;
        debug!(path = %path.display(), "acquired location lock");
        Ok(LockGuard { file, path })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Best-effort: an unwind or cancellation must not leak the
        // lock, but there is nothing useful to do with a failure here.
        let _ = fs2::FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "released location lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_dir_and_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("loc");
        let guard = LockGuard::acquire(&dir).unwrap();
        assert!(dir.join(".lock").exists());
        drop(guard);
    }

    #[test]
    fn second_acquire_after_drop_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("loc");
        {
            let _g = LockGuard::acquire(&dir).unwrap();
        }
        let _g2 = LockGuard::acquire(&dir).unwrap();
    }
}
