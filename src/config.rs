//! Store configuration

use crate::schema::SCHEMA_VERSION;
use std::path::PathBuf;

/// Configuration for one store instance.
///
/// The store name plus the structural version are the two constants that
/// define compatibility; bumping `version` is the only supported trigger
/// for the migration pipeline.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Parent directory holding the store directory and the version marker.
    pub data_dir: PathBuf,
    /// Store name; also the directory name under `data_dir`.
    pub store_name: String,
    /// Target structural version to open the store at.
    pub version: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            store_name: "tourdb".to_string(),
            version: SCHEMA_VERSION,
        }
    }
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    pub fn with_store_name(mut self, name: &str) -> Self {
        self.store_name = name.to_string();
        self
    }

    /// Override the target structural version. Tests use this to simulate
    /// older application releases; production code leaves the default.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Directory the physical store lives in.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join(&self.store_name)
    }

    /// Side-channel version marker, outside the store directory so it can
    /// be read before the store is opened.
    pub fn marker_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.version", self.store_name))
    }
}
