//! Advisory lock on the store directory
//!
//! Exactly one live handle may hold the store at a time. A second opener
//! (another process, or a leaked handle in this one) is a blocked
//! connection: surfaced as a warning, not a terminal failure — the open
//! call stays pending until the holder releases, with no internal timeout.

use crate::error::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::warn;

const LOCK_FILE: &str = "LOCK";

/// Held for the lifetime of a live store handle; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
}

impl StoreLock {
    /// Acquire the exclusive store lock, blocking while another connection
    /// holds it.
    pub fn acquire(store_dir: &Path) -> Result<Self> {
        let path = store_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_ok() {
            return Ok(Self { _file: file });
        }

        warn!(
            store = %store_dir.display(),
            "store open blocked by another connection; waiting"
        );
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs2::FileExt;

    #[test]
    fn lock_is_exclusive_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = StoreLock::acquire(dir.path()).unwrap();

        let probe = OpenOptions::new()
            .read(true)
            .write(true)
            .open(dir.path().join(LOCK_FILE))
            .unwrap();
        assert!(probe.try_lock_exclusive().is_err());
        drop(lock);
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = StoreLock::acquire(dir.path()).unwrap();
        }
        // Reacquirable once the first handle is gone.
        let _again = StoreLock::acquire(dir.path()).unwrap();
    }
}
