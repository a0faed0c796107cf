//! Physical store: directory layout, manifest, table handles
//!
//! Layout under the store directory:
//!   MANIFEST       committed structural version + physical table list
//!   LOCK           advisory connection lock
//!   <table>.tbl    one checksum-framed file per object store
//!
//! The manifest write is the commit point of any structural upgrade: table
//! files created by a failed upgrade are harmless extras until a later
//! successful pass adopts them.

pub mod checksum;
pub mod lock;
pub mod record;
pub mod table;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::schema::Table;
use crate::store::lock::StoreLock;
use crate::store::record::Clock;
use crate::store::table::TableState;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const MANIFEST_FILE: &str = "MANIFEST";

/// Committed structure of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// Physical table names, sorted. May contain legacy tables no longer
    /// in the registry; those are kept, not dropped.
    pub tables: Vec<String>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self { version: 0, tables: Vec::new() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t == name)
    }

    pub fn add_table(&mut self, name: &str) {
        if !self.contains(name) {
            self.tables.push(name.to_string());
            self.tables.sort();
        }
    }

    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let framed = fs::read(&path)?;
        let payload = checksum::decode(&framed).map_err(|e| match e {
            StoreError::Corruption(msg) => StoreError::Corruption(format!("manifest: {msg}")),
            other => other,
        })?;
        Ok(Some(serde_json::from_slice(payload)?))
    }

    /// Persist atomically. This is the structural commit point.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let payload = serde_json::to_vec(self)?;
        let framed = checksum::encode(&payload);
        let path = dir.join(MANIFEST_FILE);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &framed)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// One open physical store. Holds the advisory lock for its lifetime.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    manifest: RwLock<Manifest>,
    tables: DashMap<String, Arc<RwLock<TableState>>>,
    clock: Clock,
    _lock: StoreLock,
}

impl Store {
    /// Open the store at `dir`, upgrading its structure to `target` when
    /// the committed version is behind. A manifest ahead of `target`
    /// refuses to open.
    pub fn open(dir: &Path, target: u32) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let lock = StoreLock::acquire(dir)?;

        let mut manifest = match Manifest::load(dir)? {
            Some(m) => m,
            None => {
                info!(store = %dir.display(), version = target, "initializing new store");
                Manifest::empty()
            }
        };

        if manifest.version > target {
            return Err(StoreError::InitializationFailed(format!(
                "store is at version {} but version {} was requested",
                manifest.version, target
            )));
        }
        if manifest.version < target {
            let report = migration::run(dir, &mut manifest, target)?;
            manifest.version = target;
            manifest.save(dir)?;
            info!(
                from = report.from,
                to = report.to,
                created = report.created.len(),
                repaired = report.repaired.len(),
                "store structure committed"
            );
        }

        let tables = DashMap::new();
        for name in &manifest.tables {
            let schema = Table::parse(name).map(Table::schema);
            let state = TableState::open(dir, name, schema)?;
            tables.insert(name.clone(), Arc::new(RwLock::new(state)));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            manifest: RwLock::new(manifest),
            tables,
            clock: Clock::new(),
            _lock: lock,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn version(&self) -> u32 {
        self.manifest.read().version
    }

    /// Handle for a registry table.
    pub fn table(&self, table: Table) -> Result<Arc<RwLock<TableState>>> {
        self.table_by_name(table.name())
    }

    /// Handle for any physical table, registry or legacy.
    pub fn table_by_name(&self, name: &str) -> Result<Arc<RwLock<TableState>>> {
        self.tables
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    /// All physical table names, sorted. Includes legacy tables.
    pub fn table_names(&self) -> Vec<String> {
        self.manifest.read().tables.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_creates_every_registry_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), 3).unwrap();

        assert_eq!(store.version(), 3);
        assert_eq!(store.table_names().len(), 19);
        for table in Table::ALL {
            store.table(table).unwrap();
            assert!(dir.path().join(format!("{}.tbl", table.name())).exists());
        }
    }

    #[test]
    fn manifest_ahead_of_target_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        drop(Store::open(dir.path(), 3).unwrap());

        let err = Store::open(dir.path(), 2).unwrap_err();
        assert!(matches!(err, StoreError::InitializationFailed(_)));
    }

    #[test]
    fn reopen_at_same_version_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        drop(Store::open(dir.path(), 3).unwrap());

        let store = Store::open(dir.path(), 3).unwrap();
        assert_eq!(store.version(), 3);
        assert_eq!(store.table_names().len(), 19);
    }

    #[test]
    fn legacy_tables_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Store::open(dir.path(), 3).unwrap();
            // Simulate a table left behind by an older structure.
            let mut manifest = store.manifest.read().clone();
            manifest.add_table("retired_drafts");
            manifest.save(dir.path()).unwrap();
            TableState::open(dir.path(), "retired_drafts", None).unwrap();
        }

        let store = Store::open(dir.path(), 3).unwrap();
        assert!(store.table_names().contains(&"retired_drafts".to_string()));
        store.table_by_name("retired_drafts").unwrap();
    }

    #[test]
    fn unknown_table_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), 3).unwrap();
        let err = store.table_by_name("no_such_table").unwrap_err();
        assert!(matches!(err, StoreError::TableNotFound(_)));
    }
}
