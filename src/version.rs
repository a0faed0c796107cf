//! Version manager: side-channel record of the last reconciled schema version
//!
//! Observation runs before the store opens, so a version change can be seen
//! without touching the (possibly not-yet-upgraded) store; recording runs
//! after a successful open, so the marker never claims a version the store
//! did not actually reach. It performs no physical schema change itself and
//! never deletes the underlying store — the migration pipeline's additive
//! guarantee makes destructive recovery unnecessary. Marker IO failures are
//! logged and ignored; initialization proceeds regardless.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Outcome of the boot-time version observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCheck {
    /// No marker exists yet.
    FirstRun,
    /// Marker matches the target; nothing to reconcile.
    Unchanged,
    /// Marker differs from the target.
    Changed { from: u32, to: u32 },
}

pub struct VersionManager {
    marker_path: PathBuf,
}

impl VersionManager {
    pub fn new(config: &StoreConfig) -> Self {
        Self { marker_path: config.marker_path() }
    }

    /// Compare the persisted marker against `target` without writing
    /// anything. Infallible by design: a marker read or parse failure is
    /// logged and reported as `Unchanged`.
    pub fn observe(&self, target: u32) -> VersionCheck {
        match self.read_marker() {
            Ok(None) => VersionCheck::FirstRun,
            Ok(Some(current)) if current == target => VersionCheck::Unchanged,
            Ok(Some(current)) => {
                debug!(from = current, to = target, "schema version change observed");
                VersionCheck::Changed { from: current, to: target }
            }
            Err(err) => {
                warn!(marker = %self.marker_path.display(), %err, "version check failed; continuing");
                VersionCheck::Unchanged
            }
        }
    }

    /// Record `version` as reconciled. Called only after the store opened
    /// successfully at that version; write failures are logged and ignored.
    pub fn record(&self, version: u32) {
        if let Err(err) = self.write_marker(version) {
            warn!(marker = %self.marker_path.display(), %err, "failed to record schema version; continuing");
        }
    }

    /// Marker as currently persisted, if any.
    pub fn read_marker(&self) -> Result<Option<u32>> {
        if !self.marker_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.marker_path)
            .map_err(|e| StoreError::VersionCheck(e.to_string()))?;
        let version = raw
            .trim()
            .parse::<u32>()
            .map_err(|e| StoreError::VersionCheck(format!("bad marker '{}': {}", raw.trim(), e)))?;
        Ok(Some(version))
    }

    fn write_marker(&self, version: u32) -> Result<()> {
        if let Some(parent) = self.marker_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::VersionCheck(e.to_string()))?;
        }
        fs::write(&self.marker_path, version.to_string())
            .map_err(|e| StoreError::VersionCheck(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &std::path::Path) -> VersionManager {
        VersionManager::new(&StoreConfig::new(dir))
    }

    #[test]
    fn first_run_then_record_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        assert_eq!(mgr.observe(3), VersionCheck::FirstRun);
        mgr.record(3);
        assert_eq!(mgr.read_marker().unwrap(), Some(3));
        assert_eq!(mgr.observe(3), VersionCheck::Unchanged);
    }

    #[test]
    fn change_is_observed_but_not_recorded_by_observe() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        mgr.record(2);
        assert_eq!(mgr.observe(3), VersionCheck::Changed { from: 2, to: 3 });
        // Observation alone leaves the marker untouched.
        assert_eq!(mgr.read_marker().unwrap(), Some(2));

        mgr.record(3);
        assert_eq!(mgr.observe(3), VersionCheck::Unchanged);
    }

    #[test]
    fn garbage_marker_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        fs::write(dir.path().join("tourdb.version"), "not-a-number").unwrap();
        // Logged and swallowed; never blocks initialization.
        assert_eq!(mgr.observe(3), VersionCheck::Unchanged);
    }

    #[test]
    fn marker_is_a_string_encoded_integer() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        mgr.record(7);
        let raw = fs::read_to_string(dir.path().join("tourdb.version")).unwrap();
        assert_eq!(raw, "7");
    }
}
