//! Per-table audit log
//!
//! One text line per mutation:
//!
//! ```text
//! 2024-05-01T09:30:00Z | APPEND | sales | rows: 12
//! ```
//!
//! The store has no append primitive, so the whole log is downloaded, extended
//! and uploaded again. This is not atomic with the data it describes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::remote::{ObjectKind, ObjectRef, StoreError};
use crate::session::Session;

/// Kind of mutation recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Put,
    Append,
    Delete,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Put => write!(f, "PUT"),
            AuditAction::Append => write!(f, "APPEND"),
            AuditAction::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUT" => Ok(AuditAction::Put),
            "APPEND" => Ok(AuditAction::Append),
            "DELETE" => Ok(AuditAction::Delete),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// One recorded mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub table: String,
    /// Rows written, added or removed by the mutation
    pub rows: usize,
}

impl AuditEntry {
    /// Entry stamped with the current time
    pub fn now(action: AuditAction, table: impl Into<String>, rows: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            table: table.into(),
            rows,
        }
    }

    /// Parse one log line (without its newline)
    pub fn parse(line: &str) -> Option<Self> {
        let (head, rows) = line.rsplit_once(" | rows: ")?;
        let (timestamp, rest) = head.split_once(" | ")?;
        let (action, table) = rest.split_once(" | ")?;
        Some(Self {
            timestamp: DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc),
            action: action.parse().ok()?,
            table: table.to_string(),
            rows: rows.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | rows: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.action,
            self.table,
            self.rows
        )
    }
}

/// Audit log object of one table folder
pub struct AuditLog<'a> {
    session: &'a Session,
    folder: &'a ObjectRef,
    name: &'a str,
}

impl<'a> AuditLog<'a> {
    pub fn new(session: &'a Session, folder: &'a ObjectRef, name: &'a str) -> Self {
        Self {
            session,
            folder,
            name,
        }
    }

    fn find(&self) -> Result<Option<ObjectRef>, StoreError> {
        let mut found = self.session.store().list_children(
            &self.folder.id,
            Some(self.name),
            Some(ObjectKind::File),
        )?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Add one line, creating the log on first use
    pub fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let line = format!("{}\n", entry);
        match self.find()? {
            Some(file) => {
                let mut content = self.session.store().download(&file)?;
                content.extend_from_slice(line.as_bytes());
                self.session.store().update_content(&file, &content)?;
            }
            None => {
                self.session
                    .store()
                    .create_file(&self.folder.id, self.name, line.as_bytes())?;
            }
        }
        tracing::debug!(log = self.name, %entry, "audit entry appended");
        Ok(())
    }

    /// All parseable entries, oldest first
    pub fn entries(&self) -> Result<Vec<AuditEntry>, StoreError> {
        let Some(file) = self.find()? else {
            return Ok(Vec::new());
        };
        let content = self.session.store().download(&file)?;
        let text = String::from_utf8_lossy(&content);
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| {
                let entry = AuditEntry::parse(line);
                if entry.is_none() {
                    tracing::warn!(log = self.name, line, "skipping unreadable audit line");
                }
                entry
            })
            .collect())
    }
}
