//! Table folder lookup and object naming
//!
//! Each table lives in a folder directly under the session root whose name is
//! exactly the table name. Inside it:
//!
//! - `<table>.<ext>`      current rows, encoded by the columnar codec
//! - `<table>_meta.<ext>` human-readable summary, same codec
//! - `<table>.log`        append-only audit text
//!
//! The store does not enforce unique names. When several live folders share a
//! table name the first one in the store's listing order is used; if the
//! backend's order is not stable neither is the choice.

use std::collections::BTreeSet;

use crate::error::{GatewayError, Result};
use crate::remote::{ObjectKind, ObjectRef};
use crate::session::Session;

/// Object names belonging to one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFiles {
    pub data: String,
    pub meta: String,
    pub log: String,
}

impl TableFiles {
    pub fn for_table(table: &str, extension: &str) -> Self {
        Self {
            data: format!("{}.{}", table, extension),
            meta: format!("{}_meta.{}", table, extension),
            log: format!("{}.log", table),
        }
    }
}

/// Reject names that cannot be a single folder name
pub fn validate_table_name(table: &str) -> Result<()> {
    if table.is_empty()
        || table == "."
        || table == ".."
        || table.contains(['/', '\\'])
        || table.chars().any(char::is_control)
    {
        return Err(GatewayError::Validation(format!(
            "invalid table name {:?}",
            table
        )));
    }
    Ok(())
}

/// Resolves table names to their folders under the session root
pub struct TableLocator<'a> {
    session: &'a Session,
}

impl<'a> TableLocator<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Find the table's folder without creating it
    pub fn resolve(&self, table: &str) -> Result<Option<ObjectRef>> {
        validate_table_name(table)?;
        let mut matches = self.session.store().list_children(
            self.session.root(),
            Some(table),
            Some(ObjectKind::Folder),
        )?;
        if matches.len() > 1 {
            tracing::warn!(
                table,
                count = matches.len(),
                "several folders share this table name; using the first listed"
            );
        }
        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }

    /// Find the table's folder, creating it under the root if absent
    pub fn resolve_or_create(&self, table: &str) -> Result<ObjectRef> {
        if let Some(folder) = self.resolve(table)? {
            return Ok(folder);
        }
        let folder = self
            .session
            .store()
            .create_folder(self.session.root(), table)?;
        tracing::info!(table, folder = %folder.id, "created table folder");
        Ok(folder)
    }

    /// Find a file by exact name inside a table folder
    pub fn find_file(&self, folder: &ObjectRef, name: &str) -> Result<Option<ObjectRef>> {
        let mut matches =
            self.session
                .store()
                .list_children(&folder.id, Some(name), Some(ObjectKind::File))?;
        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }

    /// Names of all table folders under the root
    pub fn list_tables(&self) -> Result<BTreeSet<String>> {
        let folders =
            self.session
                .store()
                .list_children(self.session.root(), None, Some(ObjectKind::Folder))?;
        Ok(folders.into_iter().map(|f| f.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryStore, RemoteStore};

    fn session() -> (MemoryStore, Session) {
        let store = MemoryStore::new();
        let session = Session::new(store.clone(), store.root_id());
        (store, session)
    }

    #[test]
    fn test_file_names() {
        let files = TableFiles::for_table("t1", "parquet");
        assert_eq!(files.data, "t1.parquet");
        assert_eq!(files.meta, "t1_meta.parquet");
        assert_eq!(files.log, "t1.log");
    }

    #[test]
    fn test_resolve_or_create_creates_once() {
        let (store, session) = session();
        let locator = TableLocator::new(&session);

        assert!(locator.resolve("t1").unwrap().is_none());
        let created = locator.resolve_or_create("t1").unwrap();
        let again = locator.resolve_or_create("t1").unwrap();
        assert_eq!(created, again);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_name_is_case_sensitive() {
        let (_store, session) = session();
        let locator = TableLocator::new(&session);
        locator.resolve_or_create("Sales").unwrap();
        assert!(locator.resolve("sales").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_folders_first_wins_and_list_dedups() {
        let (store, session) = session();
        let root = store.root_id();
        let first = store.create_folder(&root, "dup").unwrap();
        store.create_folder(&root, "dup").unwrap();
        store.create_folder(&root, "other").unwrap();
        store.create_file(&root, "stray.txt", b"").unwrap();

        let locator = TableLocator::new(&session);
        assert_eq!(locator.resolve("dup").unwrap(), Some(first));
        let names: Vec<_> = locator.list_tables().unwrap().into_iter().collect();
        assert_eq!(names, vec!["dup".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_invalid_names() {
        let (_store, session) = session();
        let locator = TableLocator::new(&session);
        for bad in ["", ".", "..", "a/b", "a\\b", "a\nb", "tab\tname", "nul\0"] {
            assert!(matches!(
                locator.resolve(bad),
                Err(GatewayError::Validation(_))
            ));
        }
    }
}
