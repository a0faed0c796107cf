//! Export, import, and bulk clear
//!
//! The exchange format is one JSON object mapping table name to record
//! array. Import upserts records verbatim, timestamps included, so an
//! export followed by `clear_all` and an import reproduces the original
//! contents exactly.

use crate::crud::TourDB;
use crate::error::{Result, StoreError};
use crate::store::record::Record;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What an import did.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    /// Table names present in the payload but not in this store.
    pub skipped_tables: Vec<String>,
}

impl TourDB {
    /// Snapshot every physical table, legacy tables included.
    pub fn export(&self) -> Result<BTreeMap<String, Vec<Record>>> {
        let store = self.store()?;
        let mut dump = BTreeMap::new();
        for name in store.table_names() {
            let handle = store.table_by_name(&name)?;
            dump.insert(name, handle.read().all());
        }
        Ok(dump)
    }

    /// Upsert the payload's records into their tables. Records keep their
    /// fields as-is; nothing is re-stamped. Tables this store does not
    /// have are skipped, not an error.
    pub fn import(&self, data: BTreeMap<String, Vec<Record>>) -> Result<ImportReport> {
        let store = self.store()?;
        let mut report = ImportReport::default();

        for (name, records) in data {
            let handle = match store.table_by_name(&name) {
                Ok(handle) => handle,
                Err(StoreError::TableNotFound(_)) => {
                    warn!(table = %name, "import skipping unknown table");
                    report.skipped_tables.push(name);
                    continue;
                }
                Err(other) => return Err(other),
            };

            let mut t = handle.write();
            for mut record in records {
                let key = t.key_of(&mut record)?;
                t.put(key, record)?;
                report.imported += 1;
            }
        }

        info!(
            imported = report.imported,
            skipped = report.skipped_tables.len(),
            "import finished"
        );
        Ok(report)
    }

    /// Remove every record from every physical table. Structure, indexes,
    /// and the committed version stay in place.
    pub fn clear_all(&self) -> Result<()> {
        let store = self.store()?;
        for name in store.table_names() {
            let handle = store.table_by_name(&name)?;
            handle.write().clear()?;
        }
        info!("all tables cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::schema::Table;
    use serde_json::{json, Value};

    fn db() -> (tempfile::TempDir, TourDB) {
        let dir = tempfile::tempdir().unwrap();
        let db = TourDB::open(StoreConfig::new(dir.path())).unwrap();
        (dir, db)
    }

    fn record(fields: Value) -> Record {
        fields.as_object().unwrap().clone()
    }

    #[test]
    fn export_clear_import_round_trips() {
        let (_dir, db) = db();
        db.create(Table::Todos, record(json!({"id": "t1", "title": "a"}))).unwrap();
        db.create(Table::Tours, record(json!({"id": "tr1", "code": "T-001"}))).unwrap();

        let dump = db.export().unwrap();
        assert_eq!(dump.len(), 19);

        db.clear_all().unwrap();
        assert_eq!(db.count(Table::Todos).unwrap(), 0);
        assert_eq!(db.count(Table::Tours).unwrap(), 0);

        let report = db.import(dump.clone()).unwrap();
        assert_eq!(report.imported, 2);
        assert!(report.skipped_tables.is_empty());

        // Identical contents, timestamps included.
        assert_eq!(db.export().unwrap(), dump);
    }

    #[test]
    fn import_skips_unknown_tables() {
        let (_dir, db) = db();
        let mut payload = BTreeMap::new();
        payload.insert(
            "todos".to_string(),
            vec![record(json!({"id": "t1", "title": "kept"}))],
        );
        payload.insert(
            "from_another_app".to_string(),
            vec![record(json!({"id": "x"}))],
        );

        let report = db.import(payload).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped_tables, vec!["from_another_app"]);
        assert!(db.exists(Table::Todos, "t1").unwrap());
    }

    #[test]
    fn import_upserts_over_existing_records() {
        let (_dir, db) = db();
        db.create(Table::Todos, record(json!({"id": "t1", "title": "old"}))).unwrap();

        let mut payload = BTreeMap::new();
        payload.insert(
            "todos".to_string(),
            vec![record(json!({"id": "t1", "title": "new"}))],
        );
        db.import(payload).unwrap();

        let got = db.read(Table::Todos, "t1").unwrap().unwrap();
        assert_eq!(got["title"], json!("new"));
    }

    #[test]
    fn clear_all_keeps_structure() {
        let (_dir, db) = db();
        db.create(Table::Todos, record(json!({"id": "t1"}))).unwrap();
        db.clear_all().unwrap();

        // Tables still exist and accept writes immediately.
        assert_eq!(db.stats().unwrap().len(), 19);
        db.create(Table::Todos, record(json!({"id": "t1"}))).unwrap();
    }
}
