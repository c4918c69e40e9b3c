//! Table store: get, put, append, delete, meta and list over table folders
//!
//! Every mutation writes in the same order: data object, metadata object,
//! audit log. Validation and encoding finish before the first write, so a
//! rejected call leaves the store untouched. The three writes are separate
//! remote calls; a failure after the first is reported as
//! [`GatewayError::PartialWrite`] or [`GatewayError::AuditLog`]. At that point
//! the data object already holds the new rows, so the mutation is finished
//! with [`TableStore::repair`], never by running it again.
//!
//! Nothing serializes concurrent writers. Two processes mutating one table can
//! interleave their writes and lose rows or log lines.

use std::collections::BTreeSet;

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::codec::{ColumnarCodec, ParquetCodec};
use crate::confirm::{ConfirmationPolicy, ROW_DELETE_TOKEN, TABLE_DELETE_TOKEN};
use crate::error::{GatewayError, Result, WriteStage};
use crate::locator::{validate_table_name, TableFiles, TableLocator};
use crate::metadata;
use crate::model::{CellValue, Table};
use crate::remote::{ObjectKind, ObjectRef, StoreResult};
use crate::render;
use crate::session::Session;

/// Result of a delete call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The table folder and everything in it was removed
    TableDeleted,
    /// This many rows were removed
    RowsDeleted(usize),
    /// The selection matched no rows; nothing was written
    NoMatches,
    /// There was no folder for the table; nothing was written
    NotFound,
    /// The operator declined; nothing was written
    Cancelled,
}

/// Rows chosen for deletion
pub enum Selection<'a> {
    /// Computes a mask from the loaded table
    Predicate(Box<dyn Fn(&Table) -> Result<Vec<bool>> + 'a>),
    /// A mask computed by the caller
    Mask(Vec<bool>),
}

impl<'a> Selection<'a> {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Table) -> Result<Vec<bool>> + 'a,
    {
        Selection::Predicate(Box::new(f))
    }

    pub fn mask(mask: impl Into<Vec<bool>>) -> Self {
        Selection::Mask(mask.into())
    }

    /// Mask from dynamically typed cells; every cell must be a boolean
    pub fn from_cells(cells: impl IntoIterator<Item = CellValue>) -> Result<Self> {
        let mask = cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                cell.as_bool().ok_or_else(|| {
                    GatewayError::Validation(format!(
                        "selection mask entry {} is '{}', not a boolean",
                        i, cell
                    ))
                })
            })
            .collect::<Result<Vec<bool>>>()?;
        Ok(Selection::Mask(mask))
    }

    /// Rows whose `column` equals `value`
    pub fn column_equals(column: impl Into<String>, value: CellValue) -> Self {
        let column = column.into();
        Selection::predicate(move |table| table.column_mask(&column, |cell| *cell == value))
    }

    /// Rows at the given positions
    pub fn rows(indices: impl Into<Vec<usize>>) -> Self {
        let indices = indices.into();
        Selection::predicate(move |table| {
            let mut mask = vec![false; table.row_count()];
            for &i in &indices {
                let slot = mask.get_mut(i).ok_or_else(|| {
                    GatewayError::Validation(format!(
                        "row {} is out of range for a table of {} rows",
                        i,
                        table.row_count()
                    ))
                })?;
                *slot = true;
            }
            Ok(mask)
        })
    }

    fn resolve(&self, table: &Table) -> Result<Vec<bool>> {
        let mask = match self {
            Selection::Predicate(f) => f(table)?,
            Selection::Mask(mask) => mask.clone(),
        };
        if mask.len() != table.row_count() {
            return Err(GatewayError::Validation(format!(
                "selection mask has {} entries but the table has {} rows",
                mask.len(),
                table.row_count()
            )));
        }
        Ok(mask)
    }
}

/// Table operations over one store session
pub struct TableStore {
    session: Session,
    codec: Box<dyn ColumnarCodec>,
    confirm: ConfirmationPolicy,
}

impl TableStore {
    /// Parquet tables; destructive operations are declined until a
    /// confirmation policy is set
    pub fn new(session: Session) -> Self {
        Self {
            session,
            codec: Box::new(ParquetCodec),
            confirm: ConfirmationPolicy::AssumeNo,
        }
    }

    pub fn with_codec(mut self, codec: impl ColumnarCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_confirmation(mut self, confirm: ConfirmationPolicy) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn files(&self, table: &str) -> TableFiles {
        TableFiles::for_table(table, self.codec.extension())
    }

    fn locator(&self) -> TableLocator<'_> {
        TableLocator::new(&self.session)
    }

    fn require_folder(&self, table: &str) -> Result<ObjectRef> {
        self.locator()
            .resolve(table)?
            .ok_or_else(|| GatewayError::TableNotFound {
                table: table.to_string(),
            })
    }

    fn load(&self, table: &str, folder: &ObjectRef, files: &TableFiles) -> Result<Table> {
        let object = self
            .locator()
            .find_file(folder, &files.data)?
            .ok_or_else(|| GatewayError::ObjectNotFound {
                table: table.to_string(),
                object: files.data.clone(),
            })?;
        let bytes = self.session.store().download(&object)?;
        let data = self.codec.decode(&bytes)?;
        tracing::debug!(
            size_bytes = bytes.len(),
            rows = data.row_count(),
            "table loaded"
        );
        Ok(data)
    }

    /// Read the table's current rows
    pub fn get(&self, table: &str) -> Result<Table> {
        let _span = tracing::info_span!("table.get", table).entered();
        let folder = self.require_folder(table)?;
        self.load(table, &folder, &self.files(table))
    }

    /// Write `data` as the table's full contents, creating the table folder
    /// if needed. Without `overwrite` an existing data object is an error.
    pub fn put(&self, table: &str, data: &Table, overwrite: bool) -> Result<()> {
        let _span = tracing::info_span!("table.put", table, overwrite).entered();
        validate_table_name(table)?;
        data.validate()?;

        let files = self.files(table);
        let folder = match self.locator().resolve(table)? {
            Some(folder) => {
                if !overwrite && self.locator().find_file(&folder, &files.data)?.is_some() {
                    return Err(GatewayError::AlreadyExists {
                        table: table.to_string(),
                    });
                }
                folder
            }
            None => self.locator().resolve_or_create(table)?,
        };

        self.write(table, &folder, &files, data, AuditAction::Put, data.row_count())?;
        tracing::info!(rows = data.row_count(), "table written");
        Ok(())
    }

    /// Add rows after the existing ones. Column names, their order and
    /// every column type must match the stored table.
    pub fn append(&self, table: &str, rows: &Table) -> Result<()> {
        let _span = tracing::info_span!("table.append", table).entered();
        let folder = self.require_folder(table)?;
        let files = self.files(table);
        let existing = self.load(table, &folder, &files)?;

        rows.validate()?;
        check_same_schema(table, &existing, rows)?;

        let added = rows.row_count();
        let combined = existing.concat(rows.clone());
        self.write(table, &folder, &files, &combined, AuditAction::Append, added)?;
        tracing::info!(added, total = combined.row_count(), "rows appended");
        Ok(())
    }

    /// Remove the whole table folder after the operator answers `y`
    pub fn delete_table(&self, table: &str) -> Result<DeleteOutcome> {
        let _span = tracing::info_span!("table.delete", table).entered();
        let Some(folder) = self.locator().resolve(table)? else {
            tracing::info!("no folder for table, nothing to delete");
            self.confirm
                .show(&format!("Table '{}' not found; nothing deleted.", table));
            return Ok(DeleteOutcome::NotFound);
        };

        let question = format!(
            "Delete table '{}' and all of its files? Type '{}' to confirm: ",
            table, TABLE_DELETE_TOKEN
        );
        if !self
            .confirm
            .confirm(&question, TABLE_DELETE_TOKEN)
            .map_err(GatewayError::Prompt)?
        {
            tracing::info!("table delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        self.session.store().delete(&folder)?;
        tracing::info!(folder = %folder.id, "table folder deleted");
        Ok(DeleteOutcome::TableDeleted)
    }

    /// Remove the selected rows after the operator reviews them and answers
    /// `yes`
    pub fn delete_rows(&self, table: &str, selection: Selection<'_>) -> Result<DeleteOutcome> {
        let _span = tracing::info_span!("table.delete_rows", table).entered();
        let folder = self.require_folder(table)?;
        let files = self.files(table);
        let current = self.load(table, &folder, &files)?;

        let mask = selection.resolve(&current)?;
        let (kept, removed) = current.partition(&mask);
        if removed.is_empty() {
            tracing::info!("selection matched no rows");
            self.confirm
                .show(&format!("No rows of '{}' match the selection.", table));
            return Ok(DeleteOutcome::NoMatches);
        }

        self.confirm.show(&format!(
            "{} row(s) of '{}' selected for deletion:\n{}",
            removed.len(),
            table,
            render::format_rows(&current.columns, &removed)
        ));
        let question = format!("Type '{}' to delete these rows: ", ROW_DELETE_TOKEN);
        if !self
            .confirm
            .confirm(&question, ROW_DELETE_TOKEN)
            .map_err(GatewayError::Prompt)?
        {
            tracing::info!("row delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        self.write(table, &folder, &files, &kept, AuditAction::Delete, removed.len())?;
        tracing::info!(removed = removed.len(), remaining = kept.row_count(), "rows deleted");
        Ok(DeleteOutcome::RowsDeleted(removed.len()))
    }

    /// The stored human-readable summary
    pub fn meta(&self, table: &str) -> Result<String> {
        let _span = tracing::info_span!("table.meta", table).entered();
        let folder = self.require_folder(table)?;
        let files = self.files(table);
        let object = self
            .locator()
            .find_file(&folder, &files.meta)?
            .ok_or_else(|| GatewayError::ObjectNotFound {
                table: table.to_string(),
                object: files.meta.clone(),
            })?;
        let bytes = self.session.store().download(&object)?;
        metadata::decode(self.codec.as_ref(), table, &bytes)
    }

    /// Names of every table folder under the root
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let _span = tracing::info_span!("table.list").entered();
        self.locator().list_tables()
    }

    /// True when the table has a data object
    pub fn exists(&self, table: &str) -> Result<bool> {
        let Some(folder) = self.locator().resolve(table)? else {
            return Ok(false);
        };
        Ok(self
            .locator()
            .find_file(&folder, &self.files(table).data)?
            .is_some())
    }

    /// Audit entries of the table, oldest first
    pub fn history(&self, table: &str) -> Result<Vec<AuditEntry>> {
        let folder = self.require_folder(table)?;
        let files = self.files(table);
        Ok(AuditLog::new(&self.session, &folder, &files.log).entries()?)
    }

    /// Finish a mutation that stopped after its data object was stored.
    /// Rebuilds the metadata from the stored rows and records `action` for
    /// `rows` rows. Takes the values from [`GatewayError::pending`].
    pub fn repair(&self, table: &str, action: AuditAction, rows: usize) -> Result<()> {
        let _span = tracing::info_span!("table.repair", table, %action, rows).entered();
        let folder = self.require_folder(table)?;
        let files = self.files(table);
        let current = self.load(table, &folder, &files)?;

        let encoded_meta = metadata::encode(self.codec.as_ref(), &metadata::describe(table, &current))?;
        self.upload(&folder, &files.meta, &encoded_meta)?;
        tracing::debug!(object = %files.meta, "metadata object rebuilt");

        AuditLog::new(&self.session, &folder, &files.log)
            .append(&AuditEntry::now(action, table, rows))
            .map_err(|source| GatewayError::AuditLog {
                table: table.to_string(),
                action,
                rows,
                source,
            })?;
        tracing::info!(total = current.row_count(), "table repaired");
        Ok(())
    }

    /// Data, then metadata, then the audit entry
    fn write(
        &self,
        table: &str,
        folder: &ObjectRef,
        files: &TableFiles,
        data: &Table,
        action: AuditAction,
        rows: usize,
    ) -> Result<()> {
        let encoded = self.codec.encode(data)?;
        let summary = metadata::describe(table, data);
        let encoded_meta = metadata::encode(self.codec.as_ref(), &summary)?;

        self.upload(folder, &files.data, &encoded)?;
        tracing::debug!(object = %files.data, size_bytes = encoded.len(), "data object uploaded");

        self.upload(folder, &files.meta, &encoded_meta)
            .map_err(|source| GatewayError::PartialWrite {
                table: table.to_string(),
                action,
                rows,
                completed: WriteStage::Data,
                failed: WriteStage::Metadata,
                source,
            })?;
        tracing::debug!(object = %files.meta, "metadata object uploaded");

        AuditLog::new(&self.session, folder, &files.log)
            .append(&AuditEntry::now(action, table, rows))
            .map_err(|source| GatewayError::AuditLog {
                table: table.to_string(),
                action,
                rows,
                source,
            })
    }

    /// Replace the named file's content, or create it with the content
    fn upload(&self, folder: &ObjectRef, name: &str, content: &[u8]) -> StoreResult<ObjectRef> {
        let store = self.session.store();
        let existing = store
            .list_children(&folder.id, Some(name), Some(ObjectKind::File))?
            .into_iter()
            .next();
        match existing {
            Some(file) => {
                store.update_content(&file, content)?;
                Ok(file)
            }
            None => store.create_file(&folder.id, name, content),
        }
    }
}

fn check_same_schema(table: &str, existing: &Table, incoming: &Table) -> Result<()> {
    let mismatch = |detail: String| GatewayError::SchemaMismatch {
        table: table.to_string(),
        detail,
    };

    if existing.column_names() != incoming.column_names() {
        return Err(mismatch(format!(
            "expected columns [{}], got [{}]",
            existing.column_names().join(", "),
            incoming.column_names().join(", ")
        )));
    }
    for (have, new) in existing.columns.iter().zip(&incoming.columns) {
        if have.cell_type != new.cell_type {
            return Err(mismatch(format!(
                "column '{}' is {} but the new rows hold {}",
                have.name, have.cell_type, new.cell_type
            )));
        }
    }
    Ok(())
}
