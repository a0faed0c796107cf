//! tourdb: an embedded, versioned object store for tour-operations data
//!
//! The store keeps schemaless JSON records in a fixed set of tables
//! declared by a static registry. Structural changes only ever add tables;
//! upgrades run through an idempotent migration pipeline committed via the
//! store manifest, so any interrupted or skipped upgrade converges on the
//! next open.
//!
//! ```no_run
//! use tourdb::{StoreConfig, Table, TourDB};
//! use serde_json::json;
//!
//! # fn main() -> tourdb::Result<()> {
//! let db = TourDB::open(StoreConfig::new("data"))?;
//!
//! let todo = json!({"id": "t1", "title": "Confirm hotel", "status": "open"});
//! db.create(Table::Todos, todo.as_object().unwrap().clone())?;
//!
//! let open = db.find_by_index(Table::Todos, "status", &json!("open"))?;
//! assert_eq!(open.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod connection;
pub mod crud;
pub mod error;
pub mod migration;
pub mod query;
pub mod schema;
pub mod store;
pub mod version;

pub use backup::ImportReport;
pub use config::StoreConfig;
pub use connection::Connection;
pub use crud::TourDB;
pub use error::{Result, StoreError};
pub use query::{FilterCondition, FilterOperator, QueryOptions, SortDirection};
pub use schema::{Table, SCHEMA_VERSION};
pub use store::record::Record;
pub use version::{VersionCheck, VersionManager};
