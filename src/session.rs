//! Store session
//!
//! A session is built once from configuration and owned by the table store;
//! every remote call goes through it.

use std::sync::Arc;

use crate::config::{GatewayConfig, StoreConfig};
use crate::error::Result;
use crate::remote::{LocalStore, MemoryStore, ObjectId, RemoteStore};

/// Connected store plus the root folder that holds the tables
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn RemoteStore>,
    root: ObjectId,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("root", &self.root).finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap an already connected store
    pub fn new(store: impl RemoteStore + 'static, root: impl Into<ObjectId>) -> Self {
        Self {
            store: Arc::new(store),
            root: root.into(),
        }
    }

    /// Connect the backend named by the configuration
    pub fn open(config: &GatewayConfig) -> Result<Self> {
        let session = match &config.store {
            StoreConfig::Local { path } => {
                Session::new(LocalStore::open(path)?, config.folder_id.as_str())
            }
            StoreConfig::Memory => {
                let store = MemoryStore::new();
                let root = if config.folder_id.is_empty() {
                    store.root_id()
                } else {
                    ObjectId::from(config.folder_id.as_str())
                };
                Session::new(store, root)
            }
        };
        tracing::debug!(root = %session.root, "store session opened");
        Ok(session)
    }

    /// The remote store
    pub fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    /// Root folder holding one sub-folder per table
    pub fn root(&self) -> &ObjectId {
        &self.root
    }
}
