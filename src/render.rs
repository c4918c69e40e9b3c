//! Rendering tables for people and pipes

use std::io::{self, Write};

use crate::model::{CellValue, Column, Row, Table};

/// How `get` output is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Box-drawn grid with a row index column
    #[default]
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Write a table in the requested format
pub fn render(table: &Table, format: OutputFormat, writer: &mut dyn Write) -> io::Result<()> {
    match format {
        OutputFormat::Table => writer.write_all(format_table(table).as_bytes()),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, &to_json(table))?;
            writeln!(writer)
        }
        OutputFormat::Csv => write_csv(table, writer),
    }
}

/// Grid of a whole table
pub fn format_table(table: &Table) -> String {
    format_rows(&table.columns, &table.rows)
}

/// Grid of selected rows, labelled with their original row indices
pub fn format_rows(columns: &[Column], rows: &[Row]) -> String {
    let mut data = Vec::with_capacity(rows.len() + 1);
    let mut header = vec!["#".to_string()];
    header.extend(columns.iter().map(|c| c.name.clone()));
    data.push(header);

    for row in rows {
        let mut line = vec![row.index.to_string()];
        line.extend(row.cells.iter().map(|c| c.display().into_owned()));
        data.push(line);
    }

    build_table(&data)
}

/// Column names plus row arrays, in stored order
pub fn to_json(table: &Table) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = table
        .rows
        .iter()
        .map(|r| serde_json::Value::Array(r.cells.iter().map(cell_value_to_json).collect()))
        .collect();
    serde_json::json!({
        "columns": table.column_names(),
        "rows": rows,
    })
}

fn cell_value_to_json(value: &CellValue) -> serde_json::Value {
    match value {
        CellValue::Null => serde_json::Value::Null,
        CellValue::Bool(b) => serde_json::Value::Bool(*b),
        CellValue::Int(i) => serde_json::json!(*i),
        CellValue::Float(f) => serde_json::json!(*f),
        CellValue::String(s) => serde_json::Value::String(s.to_string()),
        CellValue::Date(d) => serde_json::Value::String(d.to_string()),
        CellValue::DateTime(dt) => serde_json::Value::String(dt.to_string()),
    }
}

/// Header row then one record per row; nulls become empty fields
pub fn write_csv(table: &Table, writer: &mut dyn Write) -> io::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.column_names())?;
    for row in &table.rows {
        csv_writer.write_record(row.cells.iter().map(|c| match c {
            CellValue::Null => String::new(),
            other => other.display().into_owned(),
        }))?;
    }
    csv_writer.flush()
}

fn build_table(data: &[Vec<String>]) -> String {
    if data.is_empty() || data[0].is_empty() {
        return String::new();
    }

    let mut col_widths: Vec<usize> = vec![0; data[0].len()];
    for row in data {
        for (i, cell) in row.iter().enumerate() {
            if i < col_widths.len() {
                col_widths[i] = col_widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    border(&mut output, &col_widths, ('┌', '┬', '┐'));
    cells(&mut output, &data[0], &col_widths);
    border(&mut output, &col_widths, ('├', '┼', '┤'));
    for row in data.iter().skip(1) {
        cells(&mut output, row, &col_widths);
    }
    border(&mut output, &col_widths, ('└', '┴', '┘'));
    output
}

fn border(output: &mut String, widths: &[usize], (left, mid, right): (char, char, char)) {
    output.push(left);
    for (i, width) in widths.iter().enumerate() {
        output.push_str(&"─".repeat(width + 2));
        if i < widths.len() - 1 {
            output.push(mid);
        }
    }
    output.push(right);
    output.push('\n');
}

fn cells(output: &mut String, row: &[String], widths: &[usize]) {
    output.push('│');
    for (i, cell) in row.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(0);
        output.push_str(&format!(" {:width$} │", cell, width = width));
    }
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::builder()
            .column("name", ["Alice", "Bob"])
            .column("value", [Some(100i64), None])
            .build()
            .unwrap()
    }

    #[test]
    fn test_grid_has_index_column() {
        let grid = format_table(&sample());
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("│ # │ name"));
        assert!(lines[3].contains("Alice"));
        assert!(lines[4].starts_with("│ 1 │ Bob"));
    }

    #[test]
    fn test_selected_rows_keep_original_index() {
        let table = sample();
        let grid = format_rows(&table.columns, &table.rows[1..]);
        assert!(grid.contains("│ 1 │ Bob"));
        assert!(!grid.contains("Alice"));
    }

    #[test]
    fn test_json_shape() {
        let value = to_json(&sample());
        assert_eq!(value["columns"], serde_json::json!(["name", "value"]));
        assert_eq!(value["rows"][0], serde_json::json!(["Alice", 100]));
        assert_eq!(value["rows"][1][1], serde_json::Value::Null);
    }

    #[test]
    fn test_csv_output() {
        let mut buf = Vec::new();
        render(&sample(), OutputFormat::Csv, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "name,value\nAlice,100\nBob,\n");
    }
}
