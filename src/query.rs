//! Query engine: full-scan filtering, sorting, pagination, index lookup
//!
//! Filters run as predicates over a snapshot of the table; there is no
//! planner and no predicate pushdown into indexes. `find_by_index` is the
//! one indexed path and only does exact matches against declared indexes.

use crate::crud::TourDB;
use crate::error::Result;
use crate::schema::Table;
use crate::store::record::Record;
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator for one filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-insensitive substring match on the string form of the field.
    Contains,
}

/// One field predicate. Conditions in a set are ANDed.
#[derive(Debug, Clone)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterCondition {
    pub fn new(field: &str, operator: FilterOperator, value: Value) -> Self {
        Self { field: field.to_string(), operator, value }
    }

    /// Whether `record` satisfies this condition. A field that is absent
    /// or not comparable with the target value never matches (except
    /// through `Ne`, which is the negation of `Eq`).
    fn matches(&self, record: &Record) -> bool {
        let field = record.get(&self.field);
        match self.operator {
            FilterOperator::Eq => field == Some(&self.value),
            FilterOperator::Ne => field != Some(&self.value),
            FilterOperator::Gt => compare(field, &self.value)
                .is_some_and(|o| o == Ordering::Greater),
            FilterOperator::Gte => compare(field, &self.value)
                .is_some_and(|o| o != Ordering::Less),
            FilterOperator::Lt => {
                compare(field, &self.value).is_some_and(|o| o == Ordering::Less)
            }
            FilterOperator::Lte => compare(field, &self.value)
                .is_some_and(|o| o != Ordering::Greater),
            FilterOperator::Contains => match (field, &self.value) {
                (Some(actual), needle) => string_form(actual)
                    .to_lowercase()
                    .contains(&string_form(needle).to_lowercase()),
                (None, _) => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Sorting and pagination, applied in that order: sort first, then offset,
/// then limit.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Field to sort by; `None` keeps primary-key order.
    pub sort_by: Option<String>,
    pub direction: SortDirection,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn sort_by(mut self, field: &str) -> Self {
        self.sort_by = Some(field.to_string());
        self
    }

    pub fn descending(mut self) -> Self {
        self.direction = SortDirection::Desc;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn apply(&self, mut records: Vec<Record>) -> Vec<Record> {
        if let Some(field) = &self.sort_by {
            records.sort_by(|a, b| {
                let ord = compare(a.get(field), b.get(field).unwrap_or(&Value::Null))
                    .unwrap_or(Ordering::Equal);
                match self.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        let offset = self.offset.unwrap_or(0);
        let mut page: Vec<Record> = records.into_iter().skip(offset).collect();
        if let Some(limit) = self.limit {
            page.truncate(limit);
        }
        page
    }
}

/// Order two JSON values of the same kind; mixed kinds are incomparable.
fn compare(left: Option<&Value>, right: &Value) -> Option<Ordering> {
    match (left?, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl TourDB {
    /// Every record in the table, sorted and paginated per `options`.
    pub fn get_all(&self, table: Table, options: &QueryOptions) -> Result<Vec<Record>> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let records = handle.read().all();
        Ok(options.apply(records))
    }

    /// Exact-match lookup against a declared secondary index.
    pub fn find_by_index(
        &self,
        table: Table,
        index: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let t = handle.read();
        t.index_lookup(index, value)
    }

    /// Full scan keeping the records that satisfy every condition, then
    /// sorted and paginated per `options`.
    pub fn filter(
        &self,
        table: Table,
        conditions: &[FilterCondition],
        options: &QueryOptions,
    ) -> Result<Vec<Record>> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let records = handle.read().all();
        let matched = records
            .into_iter()
            .filter(|r| conditions.iter().all(|c| c.matches(r)))
            .collect();
        Ok(options.apply(matched))
    }

    pub fn count(&self, table: Table) -> Result<usize> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let len = handle.read().len();
        Ok(len)
    }

    pub fn exists(&self, table: Table, key: &str) -> Result<bool> {
        let store = self.store()?;
        let handle = store.table(table)?;
        let found = handle.read().contains(key);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::StoreError;
    use serde_json::json;

    fn db() -> (tempfile::TempDir, TourDB) {
        let dir = tempfile::tempdir().unwrap();
        let db = TourDB::open(StoreConfig::new(dir.path())).unwrap();
        (dir, db)
    }

    fn record(fields: Value) -> Record {
        fields.as_object().unwrap().clone()
    }

    fn seed_todos(db: &TourDB) {
        for (id, priority, status, title) in [
            ("t1", 3, "open", "Book flights"),
            ("t2", 1, "done", "Confirm HOTEL rooms"),
            ("t3", 2, "open", "Collect passports"),
            ("t4", 5, "open", "Hotel deposit"),
        ] {
            db.create(
                Table::Todos,
                record(json!({"id": id, "priority": priority, "status": status, "title": title})),
            )
            .unwrap();
        }
    }

    #[test]
    fn get_all_sorts_and_paginates() {
        let (_dir, db) = db();
        seed_todos(&db);

        let opts = QueryOptions::default().sort_by("priority").descending();
        let all = db.get_all(Table::Todos, &opts).unwrap();
        assert_eq!(all[0]["id"], json!("t4"));
        assert_eq!(all[3]["id"], json!("t2"));

        let page = db
            .get_all(Table::Todos, &QueryOptions::default().sort_by("priority").offset(1).limit(2))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["id"], json!("t3"));
        assert_eq!(page[1]["id"], json!("t1"));
    }

    #[test]
    fn filter_ands_conditions() {
        let (_dir, db) = db();
        seed_todos(&db);

        let hits = db
            .filter(
                Table::Todos,
                &[
                    FilterCondition::new("status", FilterOperator::Eq, json!("open")),
                    FilterCondition::new("priority", FilterOperator::Gte, json!(3)),
                ],
                &QueryOptions::default().sort_by("priority"),
            )
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["id"], json!("t1"));
        assert_eq!(hits[1]["id"], json!("t4"));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let (_dir, db) = db();
        seed_todos(&db);

        let hits = db
            .filter(
                Table::Todos,
                &[FilterCondition::new("title", FilterOperator::Contains, json!("hotel"))],
                &QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn incomparable_values_never_match_range_operators() {
        let (_dir, db) = db();
        seed_todos(&db);

        // priority is a number; comparing against a string matches nothing.
        let hits = db
            .filter(
                Table::Todos,
                &[FilterCondition::new("priority", FilterOperator::Gt, json!("2"))],
                &QueryOptions::default(),
            )
            .unwrap();
        assert!(hits.is_empty());

        // A field absent from the record never satisfies a range.
        let hits = db
            .filter(
                Table::Todos,
                &[FilterCondition::new("due_date", FilterOperator::Lt, json!("2026-01-01"))],
                &QueryOptions::default(),
            )
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn find_by_index_matches_exactly() {
        let (_dir, db) = db();
        seed_todos(&db);

        let open = db.find_by_index(Table::Todos, "status", &json!("open")).unwrap();
        assert_eq!(open.len(), 3);

        let none = db.find_by_index(Table::Todos, "status", &json!("cancelled")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn undeclared_index_is_an_error() {
        let (_dir, db) = db();
        let err = db.find_by_index(Table::Todos, "title", &json!("x")).unwrap_err();
        assert!(matches!(err, StoreError::IndexNotFound { .. }));
    }

    #[test]
    fn count_and_exists() {
        let (_dir, db) = db();
        seed_todos(&db);

        assert_eq!(db.count(Table::Todos).unwrap(), 4);
        assert!(db.exists(Table::Todos, "t1").unwrap());
        assert!(!db.exists(Table::Todos, "ghost").unwrap());
    }
}
