//! Columnar encoding of tables

mod parquet;

use thiserror::Error;

use crate::model::Table;

pub use self::parquet::ParquetCodec;

/// Errors from encoding or decoding a table blob
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    /// The blob decoded but holds data this model cannot represent.
    #[error("unsupported column '{column}': {reason}")]
    Unsupported { column: String, reason: String },
}

/// Encode a table to bytes and back, preserving column order, names, element
/// types, row order and values.
pub trait ColumnarCodec: Send + Sync {
    /// Encode a table into a single blob
    fn encode(&self, table: &Table) -> Result<Vec<u8>, CodecError>;

    /// Decode a blob produced by `encode`
    fn decode(&self, bytes: &[u8]) -> Result<Table, CodecError>;

    /// File extension used for stored objects
    fn extension(&self) -> &'static str;
}
