//! Spreadsheet reader (xlsx, xls, ods)

use std::borrow::Cow;
use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::model::{CellValue, Column, Table};

use super::{settle_types, ReadOptions, TableReader};

/// Reader for spreadsheet workbooks; the first row holds column names
pub struct ExcelReader;

impl TableReader for ExcelReader {
    fn read(&self, path: &Path, options: &ReadOptions) -> Result<Table> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

        let sheet_name = match &options.sheet_name {
            Some(name) => name.clone(),
            None => match workbook.sheet_names().first() {
                Some(first) => first.clone(),
                None => bail!("No sheets found in workbook"),
            },
        };

        let range: Range<Data> = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

        read_range(&range)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "xlsx" | "xls" | "ods" | "xlsm")
    }
}

fn read_range(range: &Range<Data>) -> Result<Table> {
    let mut rows = range.rows();
    let header_row = rows.next().context("Empty sheet")?;
    let columns: Vec<Column> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = cell_to_string(cell);
            Column::new(if name.is_empty() { format!("Column{}", i + 1) } else { name }, i)
        })
        .collect();
    let width = columns.len();

    let mut table = Table::new(columns);
    for row in rows {
        let mut cells: Vec<CellValue> = row.iter().take(width).map(convert_cell).collect();
        cells.resize(width, CellValue::Null);
        table.add_row(cells);
    }

    settle_types(&mut table);
    Ok(table)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => {
            if s.trim().is_empty() {
                CellValue::Null
            } else {
                CellValue::String(Cow::Owned(s.clone()))
            }
        }
        Data::Float(f) => {
            // Whole numbers are stored as floats by most writers
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                CellValue::Int(*f as i64)
            } else {
                CellValue::Float(*f)
            }
        }
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            let s = dt.to_string();
            if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f") {
                CellValue::DateTime(datetime)
            } else if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f") {
                CellValue::DateTime(datetime)
            } else if let Ok(date) = chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                CellValue::Date(date)
            } else {
                CellValue::String(Cow::Owned(s))
            }
        }
        Data::DateTimeIso(s) => {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                CellValue::DateTime(dt)
            } else if let Ok(d) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                CellValue::Date(d)
            } else {
                CellValue::String(Cow::Owned(s.clone()))
            }
        }
        Data::DurationIso(s) => CellValue::String(Cow::Owned(s.clone())),
        Data::Error(e) => CellValue::String(Cow::Owned(format!("#{:?}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_range_uses_header_row() {
        let mut range = Range::new((0, 0), (2, 1));
        range.set_value((0, 0), Data::String("name".into()));
        range.set_value((0, 1), Data::String("value".into()));
        range.set_value((1, 0), Data::String("Alice".into()));
        range.set_value((1, 1), Data::Float(100.0));
        range.set_value((2, 0), Data::String("Bob".into()));
        range.set_value((2, 1), Data::Float(2.5));

        let table = read_range(&range).unwrap();
        assert_eq!(table.column_names(), vec!["name", "value"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0].cells[1], CellValue::Int(100));
        assert_eq!(table.columns[1].cell_type, crate::model::CellType::Float);
    }

    #[test]
    fn test_blank_header_gets_placeholder() {
        let mut range = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::String("a".into()));
        range.set_value((1, 0), Data::Int(1));
        range.set_value((1, 1), Data::Int(2));

        let table = read_range(&range).unwrap();
        assert_eq!(table.column_names(), vec!["a", "Column2"]);
    }
}
