// src/lock.rs

//! Exclusive reservation of an install destination
//!
//! Each install holds `flock(LOCK_EX)` on `<plugins_path>/.<install dir>.lock`
//! for its whole duration, so two processes can never populate the same
//! destination at once. The check for an existing destination happens
//! under the lock.
//!
//! ```ignore
//! let lock = InstallLock::try_acquire(&plugins_path, "summary")?
//!     .ok_or_else(|| Error::InstallInProgress(plugins_path.join("summary")))?;
//! // ... install ...
//! // Lock released and lock file removed on drop
//! ```

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held reservation for one install directory
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    /// Lock file path for an install directory
    pub fn path_for(plugins_path: &Path, install_dir: &str) -> PathBuf {
        plugins_path.join(format!(".{install_dir}.lock"))
    }

    /// Try to reserve `install_dir` without blocking
    ///
    /// Returns:
    /// - `Ok(Some(lock))` if the reservation was taken
    /// - `Ok(None)` if another process holds it
    /// - `Err` on I/O errors
    pub fn try_acquire(plugins_path: &Path, install_dir: &str) -> Result<Option<Self>> {
        fs::create_dir_all(plugins_path).map_err(|e| {
            Error::IoError(format!("Failed to create {}: {e}", plugins_path.display()))
        })?;

        let path = Self::path_for(plugins_path, install_dir);
        let file = File::create(&path)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", path.display())))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Reserved install directory via {}", path.display());
                Ok(Some(Self { file, path }))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == fs2::lock_contended_error().kind() =>
            {
                debug!("Install lock already held at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::IoError(format!(
                "Failed to lock {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock so no waiter sees a stale file
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_file_removed_on_drop() {
        let temp = tempfile::tempdir().unwrap();
        let lock = InstallLock::try_acquire(temp.path(), "summary")
            .unwrap()
            .unwrap();
        assert_eq!(lock.path(), temp.path().join(".summary.lock"));
        assert!(lock.path().exists());

        drop(lock);
        assert!(!temp.path().join(".summary.lock").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_second_reservation_refused() {
        let temp = tempfile::tempdir().unwrap();
        let _held = InstallLock::try_acquire(temp.path(), "summary")
            .unwrap()
            .unwrap();
        assert!(
            InstallLock::try_acquire(temp.path(), "summary")
                .unwrap()
                .is_none()
        );
        // Other destinations are independent
        assert!(
            InstallLock::try_acquire(temp.path(), "rebalance")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_creates_plugins_path() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("a/b");
        let lock = InstallLock::try_acquire(&base, "x").unwrap();
        assert!(lock.is_some());
        assert!(base.is_dir());
    }
}
