//! Remote object store capability
//!
//! The table layer only needs a handful of calls from the storage service:
//! listing the children of a folder, creating folders and files, replacing and
//! downloading file content, and deleting objects. Every call is assumed to be
//! atomic on its own; nothing spans several objects.

mod local;
mod memory;

use std::fmt;
use std::io;

use thiserror::Error;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Opaque identifier of a remote object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether an object is a container or a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Folder,
    File,
}

/// Handle to a remote folder or file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
}

impl ObjectRef {
    pub fn is_folder(&self) -> bool {
        self.kind == ObjectKind::Folder
    }
}

/// Result type for remote store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed object does not exist (or is trashed).
    #[error("remote object not found: {id}")]
    NotFound { id: ObjectId },

    /// The operation does not apply to this kind of object.
    #[error("remote object {id} is not a {expected:?}")]
    WrongKind { id: ObjectId, expected: ObjectKind },

    /// Backend I/O failure.
    #[error("remote I/O error on {id}: {source}")]
    Io {
        id: ObjectId,
        #[source]
        source: io::Error,
    },

    /// Any other backend failure (network, auth, quota).
    #[error("remote store failure: {0}")]
    Backend(String),
}

/// Capability consumed by the table layer.
pub trait RemoteStore: Send + Sync {
    /// List non-trashed children of `parent`, optionally filtered by exact name
    /// and kind, in the backend's listing order.
    fn list_children(
        &self,
        parent: &ObjectId,
        name: Option<&str>,
        kind: Option<ObjectKind>,
    ) -> StoreResult<Vec<ObjectRef>>;

    /// Create a folder under `parent`.
    fn create_folder(&self, parent: &ObjectId, name: &str) -> StoreResult<ObjectRef>;

    /// Create a file under `parent` holding `content`.
    fn create_file(&self, parent: &ObjectId, name: &str, content: &[u8]) -> StoreResult<ObjectRef>;

    /// Replace the content of an existing file.
    fn update_content(&self, file: &ObjectRef, content: &[u8]) -> StoreResult<()>;

    /// Download the full content of a file.
    fn download(&self, file: &ObjectRef) -> StoreResult<Vec<u8>>;

    /// Delete an object; folders are deleted with everything inside them.
    fn delete(&self, object: &ObjectRef) -> StoreResult<()>;
}
