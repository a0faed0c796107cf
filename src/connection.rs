//! Connection manager: one shared store handle, serialized initialization
//!
//! Every caller goes through `handle()`. The first call runs the full open
//! sequence (version check, lock, structural upgrade); concurrent callers
//! queue on the state mutex and receive the same handle once it is ready.
//! A failed open is never cached: the next call retries from scratch.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::version::VersionManager;
use parking_lot::Mutex;
use std::fs;
use std::sync::Arc;
use tracing::{debug, error};

enum ConnState {
    Uninitialized,
    Ready(Arc<Store>),
    Closed,
}

pub struct Connection {
    config: StoreConfig,
    state: Mutex<ConnState>,
}

impl Connection {
    pub fn new(config: StoreConfig) -> Self {
        Self { config, state: Mutex::new(ConnState::Uninitialized) }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The shared store handle, opening the store on first use.
    ///
    /// A connection that was closed reopens here; this is the supported way
    /// to pick a store back up after `close()`.
    pub fn handle(&self) -> Result<Arc<Store>> {
        let mut state = self.state.lock();
        if let ConnState::Ready(store) = &*state {
            return Ok(Arc::clone(store));
        }

        match self.open_store() {
            Ok(store) => {
                *state = ConnState::Ready(Arc::clone(&store));
                Ok(store)
            }
            Err(err) => {
                // Not cached: the caller may retry after fixing the cause.
                error!(%err, "store initialization failed");
                *state = ConnState::Uninitialized;
                Err(err)
            }
        }
    }

    fn open_store(&self) -> Result<Arc<Store>> {
        fs::create_dir_all(&self.config.data_dir).map_err(|e| {
            StoreError::StoreUnavailable(format!(
                "cannot create data directory '{}': {e}",
                self.config.data_dir.display()
            ))
        })?;

        // Side-channel observation only; failures are logged inside and
        // never block the open.
        let versions = VersionManager::new(&self.config);
        let check = versions.observe(self.config.version);
        debug!(?check, version = self.config.version, "version marker observed");

        let store = Store::open(&self.config.store_dir(), self.config.version).map_err(|e| {
            match e {
                e @ (StoreError::InitializationFailed(_) | StoreError::StoreUnavailable(_)) => e,
                other => StoreError::InitializationFailed(other.to_string()),
            }
        })?;
        // Recorded only once the store actually reached the target, so a
        // failed upgrade is retried on the next open.
        versions.record(self.config.version);
        Ok(Arc::new(store))
    }

    /// Close the connection. Idempotent. Outstanding handles stay usable
    /// until dropped; the store lock releases with the last one.
    pub fn close(&self) {
        let mut state = self.state.lock();
        *state = ConnState::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(&*self.state.lock(), ConnState::Ready(_))
    }
}
