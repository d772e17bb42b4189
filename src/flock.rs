use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::error::{Error, Result};

const LOCK_FILE_NAME: &str = "LOCK";

/// An advisory exclusive lock on a data directory, held for the lifetime of
/// an open `DB`. Backed by `flock(2)` via `fs4` on a sentinel file inside the
/// directory, so it only excludes other processes - not other threads within
/// this one.
pub struct DirLock {
    path: PathBuf,
    file: File,
}

impl DirLock {
    /// Creates the sentinel file if needed and takes out an exclusive,
    /// non-blocking lock on it. Fails with [`Error::Lock`] if another
    /// process already holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
        file.try_lock_exclusive().map_err(|_| Error::Lock(path.to_string_lossy().into_owned()))?;
        Ok(Self { path, file })
    }

    pub fn release(&self) -> Result<()> {
        self.file.unlock()?;
        Ok(())
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            log::warn!("failed to release directory lock at {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = DirLock::acquire(dir.path()).unwrap();
        let second = DirLock::acquire(dir.path());
        assert!(matches!(second, Err(Error::Lock(_))));
        drop(first);
        assert!(DirLock::acquire(dir.path()).is_ok());
    }
}
