//! Derived table summaries
//!
//! The metadata object stores a single-row table with one string column,
//! `table_info`, holding a free-form description of the schema and row count.
//! Readers treat the text as opaque.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::codec::ColumnarCodec;
use crate::error::{GatewayError, Result};
use crate::model::{CellType, CellValue, Table};

/// Column name of the summary field in the metadata object
pub const INFO_COLUMN: &str = "table_info";

/// Human-readable summary of a table's schema and size
pub fn describe(table_name: &str, table: &Table) -> String {
    let mut out = String::new();
    let rows = table.row_count();

    let _ = writeln!(out, "Table: {}", table_name);
    if rows == 0 {
        let _ = writeln!(out, "Rows: 0 entries");
    } else {
        let _ = writeln!(out, "Rows: {} entries, 0 to {}", rows, rows - 1);
    }
    let _ = writeln!(out, "Columns (total {}):", table.column_count());

    let name_width = table
        .columns
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max("Column".len());
    let _ = writeln!(
        out,
        " {:>3}  {:<name_width$}  {:<14}  Type",
        "#",
        "Column",
        "Non-Null Count"
    );

    let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, column) in table.columns.iter().enumerate() {
        let non_null = table
            .rows
            .iter()
            .filter(|r| r.get(idx).is_some_and(|c| !c.is_null()))
            .count();
        let _ = writeln!(
            out,
            " {:>3}  {:<name_width$}  {:<14}  {}",
            idx,
            column.name,
            format!("{} non-null", non_null),
            column.cell_type
        );
        *histogram.entry(column.cell_type.to_string()).or_default() += 1;
    }

    let types: Vec<String> = histogram
        .iter()
        .map(|(ty, count)| format!("{}({})", ty, count))
        .collect();
    let _ = writeln!(out, "Types: {}", types.join(", "));
    out
}

/// Encode a summary as the single-row metadata table
pub fn encode(codec: &dyn ColumnarCodec, summary: &str) -> Result<Vec<u8>> {
    let table = Table::builder()
        .typed_column(INFO_COLUMN, CellType::String, [summary])
        .build()?;
    Ok(codec.encode(&table)?)
}

/// Decode a metadata object back to its summary text
pub fn decode(codec: &dyn ColumnarCodec, table_name: &str, bytes: &[u8]) -> Result<String> {
    let table = codec.decode(bytes)?;
    let malformed = |detail: &str| GatewayError::MalformedMetadata {
        table: table_name.to_string(),
        detail: detail.to_string(),
    };

    let idx = table
        .column_index(INFO_COLUMN)
        .ok_or_else(|| malformed("missing summary column"))?;
    let row = table.rows.first().ok_or_else(|| malformed("no rows"))?;
    match row.get(idx) {
        Some(CellValue::String(s)) => Ok(s.to_string()),
        _ => Err(malformed("summary is not a string")),
    }
}
