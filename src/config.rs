//! Configuration handling for datagateway

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Which remote store backend a session talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Directory tree on the local filesystem
    Local { path: PathBuf },
    /// Process-local store, discarded on exit
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

/// Configuration for a gateway session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Identifier of the root folder holding one sub-folder per table.
    /// Empty means the backend's own root.
    #[serde(default)]
    pub folder_id: String,
    /// Store backend settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl GatewayConfig {
    /// Create a config for a root folder on the given store
    pub fn new(folder_id: impl Into<String>, store: StoreConfig) -> Self {
        Self {
            folder_id: folder_id.into(),
            store,
        }
    }

    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| GatewayError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| GatewayError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the root folder id
    pub fn with_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = folder_id.into();
        self
    }

    /// Use a directory-backed store
    pub fn with_local_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = StoreConfig::Local { path: path.into() };
        self
    }

    /// Use a process-local store
    pub fn with_memory_store(mut self) -> Self {
        self.store = StoreConfig::Memory;
        self
    }
}
