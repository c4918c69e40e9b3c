//! Parquet file reader

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::codec::{ColumnarCodec, ParquetCodec};
use crate::model::Table;

use super::{ReadOptions, TableReader};

/// Reads local Parquet files with the same decoder used for stored tables
pub struct ParquetFileReader;

impl TableReader for ParquetFileReader {
    fn read(&self, path: &Path, _options: &ReadOptions) -> Result<Table> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to open Parquet file: {}", path.display()))?;
        ParquetCodec
            .decode(&bytes)
            .with_context(|| format!("Failed to read Parquet file: {}", path.display()))
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "parquet" | "pq")
    }
}
