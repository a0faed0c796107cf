//! Migration pipeline: additive structural upgrades
//!
//! Upgrades run as a sequence of per-version steps followed by an
//! unconditional repair pass. Every step is expressed as a value, never as
//! control flow: a table that already exists reports `AlreadyPresent` and
//! the pipeline moves on, so re-running any step is always safe. The repair
//! pass re-checks the complete registry regardless of which steps ran,
//! which makes the pipeline converge even from a structure that skipped an
//! intermediate version.
//!
//! Nothing is ever dropped or rewritten here. The caller commits the
//! manifest after a successful run; any failure rejects the whole upgrade
//! and leaves the committed structure untouched.

use crate::error::{Result, StoreError};
use crate::schema::{tables_introduced_at, Table};
use crate::store::table::TableState;
use crate::store::Manifest;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of ensuring one table exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Created,
    AlreadyPresent,
}

/// What an upgrade run did, for logging and tests.
#[derive(Debug)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    /// Tables created by the per-version steps.
    pub created: Vec<String>,
    /// Tables the repair pass found missing and created.
    pub repaired: Vec<String>,
}

/// Upgrade the structure under `dir` from `manifest.version` to `target`,
/// recording new tables in `manifest`. The caller commits the manifest;
/// an error here rejects the upgrade as a whole.
pub fn run(dir: &Path, manifest: &mut Manifest, target: u32) -> Result<MigrationReport> {
    let from = manifest.version;
    info!(from, to = target, "upgrading store structure");

    let mut report = MigrationReport { from, to: target, created: Vec::new(), repaired: Vec::new() };

    for version in from + 1..=target {
        for table in tables_introduced_at(version) {
            if ensure_table(dir, manifest, table)? == StepOutcome::Created {
                debug!(version, table = table.name(), "table created");
                report.created.push(table.name().to_string());
            }
        }
    }

    // Repair pass: the registry is the source of truth, not the step
    // history. Covers structures that skipped an intermediate version.
    for table in Table::ALL.into_iter().filter(|t| t.since() <= target) {
        if ensure_table(dir, manifest, table)? == StepOutcome::Created {
            debug!(table = table.name(), "missing table repaired");
            report.repaired.push(table.name().to_string());
        }
    }

    Ok(report)
}

fn ensure_table(dir: &Path, manifest: &mut Manifest, table: Table) -> Result<StepOutcome> {
    let name = table.name();
    if manifest.contains(name) && dir.join(format!("{name}.tbl")).exists() {
        return Ok(StepOutcome::AlreadyPresent);
    }
    TableState::open(dir, name, Some(table.schema())).map_err(|e| {
        StoreError::TransactionFailure(format!("creating table '{name}': {e}"))
    })?;
    manifest.add_table(name);
    Ok(StepOutcome::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SCHEMA_VERSION;

    #[test]
    fn fresh_upgrade_creates_the_full_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::empty();

        let report = run(dir.path(), &mut manifest, SCHEMA_VERSION).unwrap();
        assert_eq!(report.created.len(), 19);
        assert!(report.repaired.is_empty());
        assert_eq!(manifest.tables.len(), 19);
    }

    #[test]
    fn upgrade_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::empty();
        run(dir.path(), &mut manifest, SCHEMA_VERSION).unwrap();

        // Re-running against a current structure is a no-op.
        let report = run(dir.path(), &mut manifest, SCHEMA_VERSION).unwrap();
        assert!(report.created.is_empty());
        assert!(report.repaired.is_empty());
    }

    #[test]
    fn stepwise_upgrade_only_adds_the_new_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::empty();
        run(dir.path(), &mut manifest, 1).unwrap();
        manifest.version = 1;
        assert_eq!(manifest.tables.len(), 15);

        let report = run(dir.path(), &mut manifest, 2).unwrap();
        assert_eq!(report.created, vec!["countries", "cities"]);
        assert_eq!(manifest.tables.len(), 17);
    }

    #[test]
    fn repair_pass_converges_after_a_skipped_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::empty();
        run(dir.path(), &mut manifest, 1).unwrap();

        // Claim to already be at v2 without ever creating the v2 tables.
        manifest.version = 2;
        let report = run(dir.path(), &mut manifest, 3).unwrap();

        // The v3 step created its tables; the repair pass picked up v2's.
        assert_eq!(report.created, vec!["cost_templates", "supplier_categories"]);
        assert_eq!(report.repaired, vec!["countries", "cities"]);
        assert_eq!(manifest.tables.len(), 19);
    }

    #[test]
    fn repair_recreates_a_deleted_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::empty();
        run(dir.path(), &mut manifest, SCHEMA_VERSION).unwrap();

        let lost = dir.path().join("todos.tbl");
        std::fs::remove_file(&lost).unwrap();

        manifest.version = 0;
        let report = run(dir.path(), &mut manifest, SCHEMA_VERSION).unwrap();
        assert!(report.created.contains(&"todos".to_string()));
        assert!(lost.exists());
    }
}
