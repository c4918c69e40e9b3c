//! Error types for table operations

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::audit::AuditAction;
use crate::codec::CodecError;
use crate::remote::StoreError;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Object written during a table mutation, in write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Data,
    Metadata,
    AuditLog,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStage::Data => write!(f, "data object"),
            WriteStage::Metadata => write!(f, "metadata object"),
            WriteStage::AuditLog => write!(f, "audit log"),
        }
    }
}

/// Errors raised by the table store and its collaborators.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No folder exists for the table.
    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    /// The table folder exists but a required object inside it is missing.
    #[error("{object} not found for table '{table}'")]
    ObjectNotFound { table: String, object: String },

    /// `put` without overwrite on a table that already has data.
    #[error("table '{table}' already exists (use overwrite to replace it)")]
    AlreadyExists { table: String },

    /// Appended rows do not share the stored table's schema.
    #[error("schema mismatch for table '{table}': {detail}")]
    SchemaMismatch { table: String, detail: String },

    /// Malformed input: bad table, bad selection mask, bad table name.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A remote store call failed before anything was written.
    #[error(transparent)]
    Remote(#[from] StoreError),

    /// Encoding or decoding a columnar blob failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Some objects of a mutation were written and a later one failed.
    /// The stored data already holds the new rows. Finish with
    /// [`TableStore::repair`](crate::TableStore::repair) using `action` and
    /// `rows`; re-running an append or row delete would apply it twice.
    #[error("table '{table}' partially written by {action}: {completed} stored but {failed} failed (run repair to finish): {source}")]
    PartialWrite {
        table: String,
        action: AuditAction,
        rows: usize,
        completed: WriteStage,
        failed: WriteStage,
        #[source]
        source: StoreError,
    },

    /// Data and metadata were written; only the audit entry is missing.
    #[error("table '{table}' updated by {action} but the audit log was not (run repair to finish): {source}")]
    AuditLog {
        table: String,
        action: AuditAction,
        rows: usize,
        #[source]
        source: StoreError,
    },

    /// The metadata object did not decode to the expected single-row summary.
    #[error("metadata for table '{table}' is malformed: {detail}")]
    MalformedMetadata { table: String, detail: String },

    /// Reading the operator's answer failed.
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[source] io::Error),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl GatewayError {
    /// True for both missing tables and missing objects inside a table
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::TableNotFound { .. } | GatewayError::ObjectNotFound { .. }
        )
    }

    /// True when the error left stored state partly updated
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            GatewayError::PartialWrite { .. } | GatewayError::AuditLog { .. }
        )
    }

    /// Action and row count still to be recorded after a partial write
    pub fn pending(&self) -> Option<(AuditAction, usize)> {
        match self {
            GatewayError::PartialWrite { action, rows, .. }
            | GatewayError::AuditLog { action, rows, .. } => Some((*action, *rows)),
            _ => None,
        }
    }
}
