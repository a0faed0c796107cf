//! The `TourDB` facade: table-aware CRUD over the shared connection
//!
//! All writes stamp timestamps through one policy (`store::record::stamp`)
//! before they reach the physical table. Batch semantics are deliberately
//! asymmetric: `create_many` and `delete_many` commit all-or-nothing inside
//! one table transaction, while `update_many` applies each patch
//! independently, so a mid-batch failure leaves the earlier updates in
//! place.

use crate::connection::Connection;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::schema::{Table, DEPRECATED_FIELDS};
use crate::store::record::{stamp, Record, StampMode};
use crate::store::table::BatchOp;
use crate::store::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct TourDB {
    conn: Connection,
}

impl TourDB {
    /// Lazy handle: the store opens on first operation.
    pub fn new(config: StoreConfig) -> Self {
        Self { conn: Connection::new(config) }
    }

    /// Eager open: runs the full initialization sequence now.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let db = Self::new(config);
        db.conn.handle()?;
        Ok(db)
    }

    pub fn close(&self) {
        self.conn.close();
    }

    pub(crate) fn store(&self) -> Result<Arc<Store>> {
        self.conn.handle()
    }

    /// Insert a new record. The primary key must not exist yet; tables with
    /// key allocation get one assigned when the field is absent. Returns
    /// the record as stored, stamps included.
    pub fn create(&self, table: Table, mut record: Record) -> Result<Record> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let mut t = handle.write();

        let key = t.key_of(&mut record)?;
        stamp(&mut record, StampMode::Create, &store.clock().now_iso());
        t.insert(key, record.clone())?;
        Ok(record)
    }

    /// Upsert: insert or fully replace the record at its primary key.
    pub fn put(&self, table: Table, mut record: Record) -> Result<Record> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let mut t = handle.write();

        let key = t.key_of(&mut record)?;
        stamp(&mut record, StampMode::Upsert, &store.clock().now_iso());
        t.put(key, record.clone())?;
        Ok(record)
    }

    /// Read one record by primary key.
    pub fn read(&self, table: Table, key: &str) -> Result<Option<Record>> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let t = handle.read();
        Ok(t.get(key).cloned())
    }

    /// Merge `patch` into the existing record. The primary-key field in
    /// the patch is ignored, retired sync fields are dropped from the
    /// result, and `updated_at` is refreshed. Missing target is an error.
    pub fn update(&self, table: Table, key: &str, patch: Record) -> Result<Record> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let mut t = handle.write();

        let mut merged = t.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            table: table.name().to_string(),
            key: key.to_string(),
        })?;

        let key_path = t.key_path().to_string();
        for (field, value) in patch {
            if field == key_path {
                continue;
            }
            merged.insert(field, value);
        }
        for field in DEPRECATED_FIELDS {
            merged.remove(*field);
        }
        stamp(&mut merged, StampMode::Patch, &store.clock().now_iso());

        t.put(key.to_string(), merged.clone())?;
        Ok(merged)
    }

    /// Delete by primary key. Idempotent.
    pub fn delete(&self, table: Table, key: &str) -> Result<()> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let result = handle.write().remove(key);
        result
    }

    /// Insert a batch of records in one all-or-nothing transaction: if any
    /// record is rejected, none are stored.
    pub fn create_many(&self, table: Table, records: Vec<Record>) -> Result<Vec<Record>> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let mut t = handle.write();

        let mut stored = Vec::with_capacity(records.len());
        let mut ops = Vec::with_capacity(records.len());
        for mut record in records {
            t.key_of(&mut record)?;
            stamp(&mut record, StampMode::Create, &store.clock().now_iso());
            stored.push(record.clone());
            ops.push(BatchOp::Insert(record));
        }
        debug!(table = table.name(), count = stored.len(), "batch create");
        t.apply_batch(ops)?;
        Ok(stored)
    }

    /// Delete a batch of keys in one all-or-nothing transaction. Absent
    /// keys are ignored.
    pub fn delete_many<S: AsRef<str>>(&self, table: Table, keys: &[S]) -> Result<()> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let mut t = handle.write();

        let ops = keys
            .iter()
            .map(|k| BatchOp::Delete(k.as_ref().to_string()))
            .collect::<Vec<_>>();
        debug!(table = table.name(), count = ops.len(), "batch delete");
        t.apply_batch(ops)
    }

    /// Apply a batch of patches one at a time. NOT atomic: a failure stops
    /// the batch and leaves every earlier patch applied.
    pub fn update_many(
        &self,
        table: Table,
        updates: Vec<(String, Record)>,
    ) -> Result<Vec<Record>> {
        let mut results = Vec::with_capacity(updates.len());
        for (key, patch) in updates {
            results.push(self.update(table, &key, patch)?);
        }
        Ok(results)
    }

    /// Record counts per physical table, legacy tables included.
    pub fn stats(&self) -> Result<BTreeMap<String, usize>> {
        let store = self.store()?;
        let mut counts = BTreeMap::new();
        for name in store.table_names() {
            let handle = store.table_by_name(&name)?;
            counts.insert(name, handle.read().len());
        }
        Ok(counts)
    }
}
