//! CSV/TSV reader

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{CellType, CellValue, Column, Table};

use super::{ReadOptions, TableReader};

/// Reader for delimited text files; `.tsv` is tab separated
pub struct CsvReader;

impl TableReader for CsvReader {
    fn read(&self, path: &Path, _options: &ReadOptions) -> Result<Table> {
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        };
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(BufReader::new(file));

        let headers = csv_reader
            .headers()
            .context("Failed to read CSV headers")?
            .clone();
        let columns: Vec<Column> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(name.trim(), i))
            .collect();
        let width = columns.len();

        let mut raw: Vec<Vec<String>> = Vec::new();
        for (line_num, result) in csv_reader.records().enumerate() {
            // +2 for 1-indexing and header
            let record = result.with_context(|| format!("Failed to read CSV row {}", line_num + 2))?;
            let mut fields: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            fields.resize(width, String::new());
            raw.push(fields);
        }

        let mut table = Table::new(columns);
        for fields in &raw {
            table.add_row(fields.iter().map(|s| parse_cell_value(s)).collect());
        }
        table.infer_column_types();

        // Columns mixing types keep their text as written
        for idx in 0..width {
            if table.columns[idx].cell_type != CellType::Mixed {
                continue;
            }
            for (row, fields) in table.rows.iter_mut().zip(&raw) {
                let text = fields[idx].trim();
                row.cells[idx] = if text.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::String(Cow::Owned(text.to_string()))
                };
            }
            table.columns[idx].cell_type = CellType::String;
        }

        Ok(table)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv" | "txt")
    }
}

/// Parse a string value into a CellValue with type inference
pub fn parse_cell_value(s: &str) -> CellValue {
    let trimmed = s.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed == "NA" {
        return CellValue::Null;
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return CellValue::Int(i);
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        return CellValue::Float(f);
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return CellValue::Date(date);
    }

    // ISO 8601
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return CellValue::DateTime(dt);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return CellValue::DateTime(dt);
    }

    CellValue::String(Cow::Owned(trimmed.to_string()))
}
