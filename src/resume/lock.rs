//! Single-writer lock for a checkpoint file
//!
//! Advisory `fd-lock` lock on `<file>.lock`, held for the whole download so two
//! runs never overwrite each other's series.

use crate::output::path::lock_path;
use crate::output::OutputError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file handle; call [`CheckpointLock::try_hold`] and keep the guard alive.
pub struct CheckpointLock {
    lock: RwLock<File>,
    path: PathBuf,
}

impl CheckpointLock {
    /// Open (creating if needed) the lock file for `checkpoint`
    pub fn open(checkpoint: &Path) -> Result<Self, OutputError> {
        let path = lock_path(checkpoint);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| OutputError::IoError(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| OutputError::LockError(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            lock: RwLock::new(file),
            path,
        })
    }

    /// Take the exclusive lock without blocking.
    ///
    /// Fails immediately if another run holds it. The lock is released when the
    /// guard is dropped.
    pub fn try_hold(&mut self) -> Result<RwLockWriteGuard<'_, File>, OutputError> {
        let path = self.path.display().to_string();
        self.lock.try_write().map_err(|e| {
            OutputError::LockError(format!(
                "{path} is held by another download ({e})"
            ))
        })
    }
}
