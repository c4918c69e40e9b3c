//! Reading local tabular files into tables

mod csv;
mod excel;
mod json;
mod parquet;

use std::path::Path;

use anyhow::{bail, Result};

use crate::model::{CellType, CellValue, Table};

pub use self::csv::{parse_cell_value, CsvReader};
pub use self::excel::ExcelReader;
pub use self::json::JsonReader;
pub use self::parquet::ParquetFileReader;

/// Options for reading input files
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// For spreadsheets: which sheet to read (first sheet when unset)
    pub sheet_name: Option<String>,
}

impl ReadOptions {
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet_name = Some(sheet.into());
        self
    }
}

/// Reads one file format into a table
pub trait TableReader: Send + Sync {
    /// Read a file and return a Table
    fn read(&self, path: &Path, options: &ReadOptions) -> Result<Table>;

    /// Check if this reader can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Picks a reader by file extension
pub struct ReaderFactory {
    readers: Vec<Box<dyn TableReader>>,
}

impl Default for ReaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderFactory {
    /// Create a factory with every supported reader
    pub fn new() -> Self {
        Self {
            readers: vec![
                Box::new(CsvReader),
                Box::new(ExcelReader),
                Box::new(ParquetFileReader),
                Box::new(JsonReader),
            ],
        }
    }

    /// Get a reader for the given file path
    pub fn get_reader(&self, path: &Path) -> Result<&dyn TableReader> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        for reader in &self.readers {
            if reader.supports_extension(&ext) {
                return Ok(reader.as_ref());
            }
        }

        bail!(
            "Unsupported file format: {}",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
        )
    }

    /// Read a file using the matching reader
    pub fn read(&self, path: &Path, options: &ReadOptions) -> Result<Table> {
        let reader = self.get_reader(path)?;
        let table = reader.read(path, options)?;
        tracing::debug!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.column_count(),
            "input file read"
        );
        Ok(table)
    }
}

/// Infer column types; columns mixing incompatible types become text
pub(crate) fn settle_types(table: &mut Table) {
    table.infer_column_types();
    for idx in 0..table.column_count() {
        if table.columns[idx].cell_type != CellType::Mixed {
            continue;
        }
        tracing::info!(column = %table.columns[idx].name, "mixed value types, reading column as text");
        for row in &mut table.rows {
            if let Some(cell) = row.cells.get_mut(idx) {
                if !cell.is_null() {
                    *cell = CellValue::from(cell.display().into_owned());
                }
            }
        }
        table.columns[idx].cell_type = CellType::String;
    }
}
