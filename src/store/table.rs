//! One physical object store
//!
//! Records live in an ordered map keyed by the normalized primary key;
//! secondary indexes are in-memory maps rebuilt from the schema on load and
//! maintained incrementally on every mutation. The whole table persists as
//! a single checksum-framed JSON file, rewritten atomically (tmp + rename)
//! after each committed mutation.

use crate::error::{Result, StoreError};
use crate::schema::{IndexSchema, TableSchema};
use crate::store::checksum;
use crate::store::record::{key_string, Record};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Index name → index key → primary keys carrying that key.
type IndexMap = HashMap<String, BTreeMap<String, Vec<String>>>;

/// A single staged mutation inside an all-or-nothing batch.
pub enum BatchOp {
    /// Insert, failing on an existing primary key (create semantics).
    Insert(Record),
    /// Remove by primary key; absent keys are ignored.
    Delete(String),
}

#[derive(Debug)]
pub struct TableState {
    name: String,
    key_path: String,
    auto_increment: bool,
    index_schemas: Vec<IndexSchema>,
    path: PathBuf,
    records: BTreeMap<String, Record>,
    indexes: IndexMap,
    next_auto_key: u64,
}

impl TableState {
    /// Open the table file under `dir`, creating an empty store when the
    /// file does not exist yet. `schema` is `None` for legacy tables that
    /// predate the current registry; those keep their records but carry no
    /// declared indexes.
    pub fn open(dir: &Path, name: &str, schema: Option<&'static TableSchema>) -> Result<Self> {
        let path = dir.join(format!("{name}.tbl"));
        let (key_path, auto_increment, index_schemas) = match schema {
            Some(s) => (s.key_path.to_string(), s.auto_increment, s.indexes.to_vec()),
            None => ("id".to_string(), false, Vec::new()),
        };

        let records: BTreeMap<String, Record> = if path.exists() {
            let framed = fs::read(&path)?;
            let payload = checksum::decode(&framed).map_err(|e| match e {
                StoreError::Corruption(msg) => {
                    StoreError::Corruption(format!("table '{name}': {msg}"))
                }
                other => other,
            })?;
            serde_json::from_slice(payload)?
        } else {
            BTreeMap::new()
        };

        let mut table = Self {
            name: name.to_string(),
            key_path,
            auto_increment,
            index_schemas,
            path,
            records,
            indexes: IndexMap::new(),
            next_auto_key: 1,
        };
        table.rebuild_indexes();
        table.next_auto_key = table
            .records
            .keys()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);

        if !table.path.exists() {
            table.persist()?;
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// All records in primary-key order.
    pub fn all(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }

    /// Extract the record's primary key, allocating the next integer key
    /// for auto-increment tables when the field is absent.
    pub fn key_of(&mut self, record: &mut Record) -> Result<String> {
        if let Some(value) = record.get(&self.key_path) {
            if let Some(key) = key_string(value) {
                return Ok(key);
            }
        }
        if self.auto_increment {
            let key = self.next_auto_key;
            self.next_auto_key += 1;
            record.insert(self.key_path.clone(), Value::from(key));
            return Ok(key.to_string());
        }
        Err(StoreError::TransactionFailure(format!(
            "record in table '{}' is missing primary-key field '{}'",
            self.name, self.key_path
        )))
    }

    /// Insert with create semantics: an existing primary key rejects.
    pub fn insert(&mut self, key: String, record: Record) -> Result<()> {
        if self.records.contains_key(&key) {
            return Err(StoreError::DuplicateKey { table: self.name.clone(), key });
        }
        self.check_unique_indexes(&key, &record)?;
        self.index_insert(&key, &record);
        self.records.insert(key, record);
        self.persist()
    }

    /// Upsert: replaces any existing record at `key`.
    pub fn put(&mut self, key: String, record: Record) -> Result<()> {
        self.check_unique_indexes(&key, &record)?;
        if let Some(old) = self.records.get(&key) {
            let old = old.clone();
            self.index_remove(&key, &old);
        }
        self.index_insert(&key, &record);
        self.records.insert(key, record);
        self.persist()
    }

    /// Remove by key. Idempotent: an absent key is not an error.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if let Some(old) = self.records.remove(key) {
            self.index_remove(key, &old);
            self.persist()?;
        }
        Ok(())
    }

    /// Remove every record, keeping the table structure.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.rebuild_indexes();
        self.persist()
    }

    /// Apply a batch of mutations as one all-or-nothing transaction:
    /// every op is staged against a copy of the table state, and nothing
    /// becomes visible or durable unless all of them succeed.
    pub fn apply_batch(&mut self, ops: Vec<BatchOp>) -> Result<()> {
        let mut staged_records = self.records.clone();
        let mut staged_indexes = self.indexes.clone();

        for op in ops {
            match op {
                BatchOp::Insert(record) => {
                    let key = match record.get(&self.key_path).and_then(key_string) {
                        Some(key) => key,
                        None => {
                            return Err(StoreError::TransactionFailure(format!(
                                "record in table '{}' is missing primary-key field '{}'",
                                self.name, self.key_path
                            )))
                        }
                    };
                    if staged_records.contains_key(&key) {
                        return Err(StoreError::DuplicateKey {
                            table: self.name.clone(),
                            key,
                        });
                    }
                    Self::check_unique_against(
                        &self.name,
                        &self.index_schemas,
                        &staged_indexes,
                        &key,
                        &record,
                    )?;
                    Self::index_insert_into(&self.index_schemas, &mut staged_indexes, &key, &record);
                    staged_records.insert(key, record);
                }
                BatchOp::Delete(key) => {
                    if let Some(old) = staged_records.remove(&key) {
                        Self::index_remove_from(
                            &self.index_schemas,
                            &mut staged_indexes,
                            &key,
                            &old,
                        );
                    }
                }
            }
        }

        self.records = staged_records;
        self.indexes = staged_indexes;
        self.persist()
    }

    /// Exact-match lookup against a declared secondary index.
    pub fn index_lookup(&self, index_name: &str, value: &Value) -> Result<Vec<Record>> {
        if !self.index_schemas.iter().any(|i| i.name == index_name) {
            return Err(StoreError::IndexNotFound {
                table: self.name.clone(),
                index: index_name.to_string(),
            });
        }
        let Some(key) = key_string(value) else {
            return Ok(Vec::new());
        };
        let keys = self
            .indexes
            .get(index_name)
            .and_then(|m| m.get(&key))
            .cloned()
            .unwrap_or_default();
        Ok(keys.iter().filter_map(|k| self.records.get(k)).cloned().collect())
    }

    // ---- index maintenance ----

    fn rebuild_indexes(&mut self) {
        let mut indexes = IndexMap::new();
        for schema in &self.index_schemas {
            indexes.insert(schema.name.to_string(), BTreeMap::new());
        }
        for (key, record) in &self.records {
            Self::index_insert_into(&self.index_schemas, &mut indexes, key, record);
        }
        self.indexes = indexes;
    }

    fn index_insert(&mut self, key: &str, record: &Record) {
        Self::index_insert_into(&self.index_schemas, &mut self.indexes, key, record);
    }

    fn index_remove(&mut self, key: &str, record: &Record) {
        Self::index_remove_from(&self.index_schemas, &mut self.indexes, key, record);
    }

    fn index_insert_into(
        schemas: &[IndexSchema],
        indexes: &mut IndexMap,
        key: &str,
        record: &Record,
    ) {
        for schema in schemas {
            let Some(index_key) = record.get(schema.key_path).and_then(key_string) else {
                continue;
            };
            indexes
                .entry(schema.name.to_string())
                .or_default()
                .entry(index_key)
                .or_default()
                .push(key.to_string());
        }
    }

    fn index_remove_from(
        schemas: &[IndexSchema],
        indexes: &mut IndexMap,
        key: &str,
        record: &Record,
    ) {
        for schema in schemas {
            let Some(index_key) = record.get(schema.key_path).and_then(key_string) else {
                continue;
            };
            if let Some(entries) = indexes.get_mut(schema.name).and_then(|m| m.get_mut(&index_key))
            {
                entries.retain(|k| k != key);
            }
        }
    }

    fn check_unique_indexes(&self, key: &str, record: &Record) -> Result<()> {
        Self::check_unique_against(&self.name, &self.index_schemas, &self.indexes, key, record)
    }

    fn check_unique_against(
        table: &str,
        schemas: &[IndexSchema],
        indexes: &IndexMap,
        key: &str,
        record: &Record,
    ) -> Result<()> {
        for schema in schemas.iter().filter(|s| s.unique) {
            let Some(index_key) = record.get(schema.key_path).and_then(key_string) else {
                continue;
            };
            let holders = indexes.get(schema.name).and_then(|m| m.get(&index_key));
            if let Some(holders) = holders {
                if holders.iter().any(|k| k != key) {
                    return Err(StoreError::DuplicateKey {
                        table: table.to_string(),
                        key: format!("{}={}", schema.name, index_key),
                    });
                }
            }
        }
        Ok(())
    }

    // ---- persistence ----

    /// Write the table file atomically: serialize, frame with a checksum,
    /// write to a sibling tmp file, rename over the target.
    fn persist(&self) -> Result<()> {
        let payload = serde_json::to_vec(&self.records)?;
        let framed = checksum::encode(&payload);
        let tmp = self.path.with_extension("tbl.tmp");
        fs::write(&tmp, &framed)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
