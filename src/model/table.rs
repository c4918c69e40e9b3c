//! Table, Row, and Cell data structures

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::schema::{CellType, Column};
use crate::error::{GatewayError, Result};

static NULL_CELL: CellValue = CellValue::Null;

/// A cell value with type information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Cow<'static, str>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Int(a), CellValue::Int(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a == b,
            // Widened columns store ints as floats and dates as midnight datetimes
            (CellValue::Int(a), CellValue::Float(b)) => (*a as f64) == *b,
            (CellValue::Float(a), CellValue::Int(b)) => *a == (*b as f64),
            (CellValue::Date(a), CellValue::DateTime(b)) => a.and_hms_opt(0, 0, 0) == Some(*b),
            (CellValue::DateTime(a), CellValue::Date(b)) => Some(*a) == b.and_hms_opt(0, 0, 0),
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl CellValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Boolean payload, if this is a boolean cell
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload, if this is a string cell
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Convert to a display string
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            CellValue::Null => Cow::Borrowed("NULL"),
            CellValue::Bool(b) => Cow::Owned(b.to_string()),
            CellValue::Int(i) => Cow::Owned(i.to_string()),
            CellValue::Float(f) => Cow::Owned(f.to_string()),
            CellValue::String(s) => Cow::Borrowed(s.as_ref()),
            CellValue::Date(d) => Cow::Owned(d.to_string()),
            CellValue::DateTime(dt) => Cow::Owned(dt.to_string()),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(Cow::Owned(s.to_string()))
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(Cow::Owned(s))
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        CellValue::Int(i as i64)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => CellValue::Null,
        }
    }
}

/// A row in the table
#[derive(Debug, Clone)]
pub struct Row {
    /// Cell values in column order
    pub cells: Vec<CellValue>,
    /// Position of the row in its table, contiguous from 0
    pub index: usize,
}

impl Row {
    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// A table containing columns and rows
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column definitions
    pub columns: Vec<Column>,
    /// All rows in the table
    pub rows: Vec<Row>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.rows.len() == other.rows.len()
            && self
                .rows
                .iter()
                .zip(&other.rows)
                .all(|(a, b)| a.cells == b.cells)
    }
}

impl Table {
    /// Create a new empty table with column definitions
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Start building a table column by column
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    /// Add a row to the table, numbering it after the existing rows
    pub fn add_row(&mut self, cells: Vec<CellValue>) {
        let index = self.rows.len();
        self.rows.push(Row { cells, index });
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).unwrap_or(&NULL_CELL))
                .collect(),
        )
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Infer every column's type from its data
    pub fn infer_column_types(&mut self) {
        for col_idx in 0..self.columns.len() {
            let inferred = CellType::infer(self.rows.iter().filter_map(|r| r.cells.get(col_idx)));
            self.columns[col_idx].cell_type = inferred;
        }
    }

    /// Check that the table can be stored: at least one column, unique column
    /// names, rows as wide as the header and cells matching their column type.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(GatewayError::Validation("table has no columns".into()));
        }

        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(GatewayError::Validation(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
            if col.cell_type == CellType::Mixed {
                return Err(GatewayError::Validation(format!(
                    "column '{}' mixes incompatible value types",
                    col.name
                )));
            }
        }

        for row in &self.rows {
            if row.cells.len() != self.columns.len() {
                return Err(GatewayError::Validation(format!(
                    "row {} has {} cells but the table has {} columns",
                    row.index,
                    row.cells.len(),
                    self.columns.len()
                )));
            }
            for (cell, col) in row.cells.iter().zip(&self.columns) {
                if !col.cell_type.admits(cell) {
                    return Err(GatewayError::Validation(format!(
                        "row {} holds a {} value in {} column '{}'",
                        row.index,
                        CellType::of(cell),
                        col.cell_type,
                        col.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Append the rows of `other` after this table's rows, renumbering 0..n-1.
    /// Callers are responsible for checking the schemas agree.
    pub fn concat(mut self, other: Table) -> Table {
        for row in other.rows {
            self.add_row(row.cells);
        }
        self
    }

    /// Split rows by a mask: `(kept, removed)` where removed rows are those
    /// whose mask entry is true. Both halves keep original relative order and
    /// the kept table is renumbered from 0.
    pub fn partition(&self, mask: &[bool]) -> (Table, Vec<Row>) {
        let mut kept = Table::new(self.columns.clone());
        let mut removed = Vec::new();
        for (row, &selected) in self.rows.iter().zip(mask) {
            if selected {
                removed.push(row.clone());
            } else {
                kept.add_row(row.cells.clone());
            }
        }
        (kept, removed)
    }

    /// Evaluate `pred` against every cell of a column, producing a row mask
    pub fn column_mask<F>(&self, column: &str, pred: F) -> Result<Vec<bool>>
    where
        F: Fn(&CellValue) -> bool,
    {
        let values = self.column_values(column).ok_or_else(|| {
            GatewayError::Validation(format!("unknown column '{}'", column))
        })?;
        Ok(values.into_iter().map(pred).collect())
    }
}

/// Column-wise table construction with type inference
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: Vec<(String, Option<CellType>, Vec<CellValue>)>,
}

impl TableBuilder {
    /// Add a column whose type is inferred from its values
    pub fn column<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.columns.push((name.into(), None, values));
        self
    }

    /// Add a column with an explicit type (useful for empty or all-null columns)
    pub fn typed_column<I, V>(mut self, name: impl Into<String>, cell_type: CellType, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.columns.push((name.into(), Some(cell_type), values));
        self
    }

    /// Assemble the table; every column must have the same length
    pub fn build(self) -> Result<Table> {
        let row_count = self.columns.first().map_or(0, |(_, _, v)| v.len());
        if let Some((name, _, values)) = self.columns.iter().find(|(_, _, v)| v.len() != row_count) {
            return Err(GatewayError::Validation(format!(
                "column '{}' has {} values, expected {}",
                name,
                values.len(),
                row_count
            )));
        }

        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, (name, declared, values))| {
                let cell_type = declared.unwrap_or_else(|| CellType::infer(values));
                Column::with_type(name.clone(), i, cell_type)
            })
            .collect();

        let mut table = Table::new(columns);
        let mut value_iters: Vec<_> = self.columns.into_iter().map(|(_, _, v)| v.into_iter()).collect();
        for _ in 0..row_count {
            let cells = value_iters
                .iter_mut()
                .map(|it| it.next().unwrap_or(CellValue::Null))
                .collect();
            table.add_row(cells);
        }
        Ok(table)
    }
}
