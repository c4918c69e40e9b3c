//! JSON reader: an array of objects, or one object per line

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexSet;
use serde_json::Value;

use crate::model::{CellValue, Column, Table};

use super::{settle_types, ReadOptions, TableReader};

/// Reader for JSON records; keys become columns in first-seen order
pub struct JsonReader;

impl TableReader for JsonReader {
    fn read(&self, path: &Path, _options: &ReadOptions) -> Result<Table> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to open JSON file: {}", path.display()))?;

        let records = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => items,
            Ok(item @ Value::Object(_)) => vec![item],
            Ok(_) => bail!("JSON must be an array or object"),
            // Not one document: try one object per line
            Err(whole_err) => text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .enumerate()
                .map(|(i, line)| {
                    serde_json::from_str(line)
                        .with_context(|| format!("Failed to parse JSON line {}: {}", i + 1, whole_err))
                })
                .collect::<Result<Vec<Value>>>()?,
        };

        read_records(&records)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "json" | "jsonl" | "ndjson")
    }
}

fn read_records(records: &[Value]) -> Result<Table> {
    let mut column_names: IndexSet<String> = IndexSet::new();
    for record in records {
        match record {
            Value::Object(obj) => column_names.extend(obj.keys().cloned()),
            other => bail!("Expected JSON objects, found: {}", other),
        }
    }
    if column_names.is_empty() {
        bail!("JSON input has no fields");
    }

    let columns: Vec<Column> = column_names
        .iter()
        .enumerate()
        .map(|(i, name)| Column::new(name.clone(), i))
        .collect();
    let mut table = Table::new(columns);

    for record in records {
        if let Value::Object(obj) = record {
            table.add_row(
                column_names
                    .iter()
                    .map(|key| json_value_to_cell(obj.get(key)))
                    .collect(),
            );
        }
    }

    settle_types(&mut table);
    Ok(table)
}

fn json_value_to_cell(value: Option<&Value>) -> CellValue {
    match value {
        None | Some(Value::Null) => CellValue::Null,
        Some(Value::Bool(b)) => CellValue::Bool(*b),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                CellValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(Cow::Owned(n.to_string()))
            }
        }
        Some(Value::String(s)) => {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return CellValue::Date(date);
            }
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                return CellValue::DateTime(dt);
            }
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return CellValue::DateTime(dt);
            }
            CellValue::String(Cow::Owned(s.clone()))
        }
        // Nested values are kept as their JSON text
        Some(nested) => CellValue::String(Cow::Owned(nested.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellType;
    use std::io::Write;

    fn read(content: &str, suffix: &str) -> Result<Table> {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        JsonReader.read(file.path(), &ReadOptions::default())
    }

    #[test]
    fn test_array_of_objects() {
        let table = read(
            r#"[{"name": "Alice", "value": 100}, {"name": "Bob", "extra": true}]"#,
            ".json",
        )
        .unwrap();
        assert_eq!(table.column_names(), vec!["name", "value", "extra"]);
        assert_eq!(table.columns[1].cell_type, CellType::Int);
        assert!(table.rows[1].cells[1].is_null());
    }

    #[test]
    fn test_json_lines() {
        let table = read("{\"a\": 1}\n{\"a\": 2}\n", ".jsonl").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1].cells[0], CellValue::Int(2));
    }

    #[test]
    fn test_rejects_scalars() {
        assert!(read("[1, 2]", ".json").is_err());
        assert!(read("[]", ".json").is_err());
    }
}
