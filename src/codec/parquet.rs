//! Parquet codec

use std::borrow::Cow;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int64Array, NullArray,
    StringArray, TimestampMicrosecondArray, TimestampNanosecondArray,
};
use arrow::datatypes::{
    DataType as ArrowType, Date32Type, Date64Type, Field, Float16Type, Float32Type, Float64Type, Int16Type,
    Int32Type, Int64Type, Int8Type, Schema, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::model::{CellType, CellValue, Column, Table};

use super::{CodecError, ColumnarCodec};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Parquet encoding through Arrow record batches
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetCodec;

impl ColumnarCodec for ParquetCodec {
    fn encode(&self, table: &Table) -> Result<Vec<u8>, CodecError> {
        let arrays: Vec<ArrayRef> = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| build_array(table, idx, column))
            .collect::<Result<_, _>>()?;

        // Array types decide the schema; datetime columns pick their unit per table
        let fields: Vec<Field> = table
            .columns
            .iter()
            .zip(&arrays)
            .map(|(c, array)| Field::new(c.name.clone(), array.data_type().clone(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut buffer = Vec::new();
        {
            let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props))?;
            writer.write(&batch)?;
            writer.close()?;
        }

        tracing::debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            size_bytes = buffer.len(),
            "parquet encode completed"
        );
        Ok(buffer)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Table, CodecError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        // Create columns from schema
        let columns: Vec<Column> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| {
                Column::with_type(field.name().clone(), i, arrow_type_to_cell_type(field.data_type()))
            })
            .collect();

        let mut table = Table::new(columns);

        for batch_result in reader {
            let batch = batch_result?;

            let column_cells: Vec<Vec<CellValue>> = batch
                .columns()
                .iter()
                .zip(schema.fields().iter())
                .map(|(array, field)| array_to_cells(array, field.name()))
                .collect::<Result<_, _>>()?;

            let mut iters: Vec<_> = column_cells.into_iter().map(Vec::into_iter).collect();
            for _ in 0..batch.num_rows() {
                let cells = iters
                    .iter_mut()
                    .map(|it| it.next().unwrap_or(CellValue::Null))
                    .collect();
                table.add_row(cells);
            }
        }

        Ok(table)
    }

    fn extension(&self) -> &'static str {
        "parquet"
    }
}

fn arrow_type_to_cell_type(arrow_type: &ArrowType) -> CellType {
    match arrow_type {
        ArrowType::Null => CellType::Null,
        ArrowType::Boolean => CellType::Bool,
        ArrowType::Int8
        | ArrowType::Int16
        | ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::UInt8
        | ArrowType::UInt16
        | ArrowType::UInt32
        | ArrowType::UInt64 => CellType::Int,
        ArrowType::Float16 | ArrowType::Float32 | ArrowType::Float64 => CellType::Float,
        ArrowType::Utf8 | ArrowType::LargeUtf8 => CellType::String,
        ArrowType::Date32 | ArrowType::Date64 => CellType::Date,
        ArrowType::Timestamp(_, _) => CellType::DateTime,
        _ => CellType::String, // Other types decode as their display string
    }
}

/// Gather one column's values, rejecting cells the column type cannot hold
fn gather<T>(
    table: &Table,
    idx: usize,
    column: &Column,
    extract: impl Fn(&CellValue) -> Option<T>,
) -> Result<Vec<Option<T>>, CodecError> {
    table
        .rows
        .iter()
        .map(|row| match row.cells.get(idx) {
            None | Some(CellValue::Null) => Ok(None),
            Some(cell) => extract(cell).map(Some).ok_or_else(|| CodecError::Unsupported {
                column: column.name.clone(),
                reason: format!(
                    "row {} holds a {} value in a {} column",
                    row.index,
                    CellType::of(cell),
                    column.cell_type
                ),
            }),
        })
        .collect()
}

fn date_to_days(date: &NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn datetime_to_micros(dt: &NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

fn as_datetime(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::DateTime(dt) => Some(*dt),
        CellValue::Date(d) => d.and_hms_opt(0, 0, 0),
        _ => None,
    }
}

/// True when some cell of the column carries sub-microsecond digits
fn needs_nanos(table: &Table, idx: usize) -> bool {
    table.rows.iter().any(|row| {
        matches!(row.cells.get(idx), Some(CellValue::DateTime(dt)) if dt.nanosecond() % 1_000 != 0)
    })
}

/// Nanosecond timestamps; only 1677-09-21 to 2262-04-11 fits in an i64
fn nanos_array(table: &Table, idx: usize, column: &Column) -> Result<ArrayRef, CodecError> {
    let values = gather(table, idx, column, |c| {
        as_datetime(c).map(|dt| dt.and_utc().timestamp_nanos_opt())
    })?
    .into_iter()
    .map(|v| match v {
        None => Ok(None),
        Some(Some(ns)) => Ok(Some(ns)),
        Some(None) => Err(CodecError::Unsupported {
            column: column.name.clone(),
            reason: "timestamps with sub-microsecond digits must fall between 1677 and 2262"
                .into(),
        }),
    })
    .collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(TimestampNanosecondArray::from(values)))
}

fn build_array(table: &Table, idx: usize, column: &Column) -> Result<ArrayRef, CodecError> {
    let array: ArrayRef = match column.cell_type {
        CellType::Null => Arc::new(NullArray::new(table.row_count())),
        CellType::Bool => Arc::new(BooleanArray::from(gather(table, idx, column, |c| {
            c.as_bool()
        })?)),
        CellType::Int => Arc::new(Int64Array::from(gather(table, idx, column, |c| match c {
            CellValue::Int(i) => Some(*i),
            _ => None,
        })?)),
        CellType::Float => Arc::new(Float64Array::from(gather(table, idx, column, |c| match c {
            CellValue::Float(f) => Some(*f),
            CellValue::Int(i) => Some(*i as f64),
            _ => None,
        })?)),
        CellType::String => Arc::new(StringArray::from(gather(table, idx, column, |c| {
            c.as_str().map(str::to_string)
        })?)),
        CellType::Date => Arc::new(Date32Array::from(gather(table, idx, column, |c| match c {
            CellValue::Date(d) => Some(date_to_days(d)),
            _ => None,
        })?)),
        CellType::DateTime if needs_nanos(table, idx) => nanos_array(table, idx, column)?,
        CellType::DateTime => Arc::new(TimestampMicrosecondArray::from(gather(
            table,
            idx,
            column,
            |c| as_datetime(c).map(|dt| datetime_to_micros(&dt)),
        )?)),
        CellType::Mixed => {
            return Err(CodecError::Unsupported {
                column: column.name.clone(),
                reason: "mixed value types cannot be stored in one column".into(),
            })
        }
    };
    Ok(array)
}

macro_rules! int_cells {
    ($array:expr, $t:ty, $column:expr) => {
        $array
            .as_primitive::<$t>()
            .iter()
            .map(|v| match v {
                None => Ok(CellValue::Null),
                Some(x) => i64::try_from(x)
                    .map(CellValue::Int)
                    .map_err(|_| CodecError::Unsupported {
                        column: $column.to_string(),
                        reason: format!("integer {} does not fit in a signed 64-bit column", x),
                    }),
            })
            .collect::<Result<_, CodecError>>()?
    };
}

macro_rules! float_cells {
    ($array:expr, $t:ty) => {
        $array
            .as_primitive::<$t>()
            .iter()
            .map(|v| v.map_or(CellValue::Null, |x| CellValue::Float(f64::from(x))))
            .collect()
    };
}

fn timestamp_cells(
    values: impl Iterator<Item = Option<i64>>,
    to_datetime: impl Fn(i64) -> Option<DateTime<Utc>>,
    column: &str,
) -> Result<Vec<CellValue>, CodecError> {
    values
        .map(|v| match v {
            None => Ok(CellValue::Null),
            Some(raw) => to_datetime(raw)
                .map(|dt| CellValue::DateTime(dt.naive_utc()))
                .ok_or_else(|| CodecError::Unsupported {
                    column: column.to_string(),
                    reason: format!("timestamp {} out of range", raw),
                }),
        })
        .collect()
}

fn array_to_cells(array: &ArrayRef, column: &str) -> Result<Vec<CellValue>, CodecError> {
    let cells = match array.data_type() {
        ArrowType::Null => vec![CellValue::Null; array.len()],
        ArrowType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(CellValue::Null, CellValue::Bool))
            .collect(),
        ArrowType::Int8 => int_cells!(array, Int8Type, column),
        ArrowType::Int16 => int_cells!(array, Int16Type, column),
        ArrowType::Int32 => int_cells!(array, Int32Type, column),
        ArrowType::Int64 => int_cells!(array, Int64Type, column),
        ArrowType::UInt8 => int_cells!(array, UInt8Type, column),
        ArrowType::UInt16 => int_cells!(array, UInt16Type, column),
        ArrowType::UInt32 => int_cells!(array, UInt32Type, column),
        ArrowType::UInt64 => int_cells!(array, UInt64Type, column),
        ArrowType::Float16 => array
            .as_primitive::<Float16Type>()
            .iter()
            .map(|v| v.map_or(CellValue::Null, |x| CellValue::Float(x.to_f64())))
            .collect(),
        ArrowType::Float32 => float_cells!(array, Float32Type),
        ArrowType::Float64 => float_cells!(array, Float64Type),
        ArrowType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(CellValue::Null, |s| CellValue::String(Cow::Owned(s.to_string()))))
            .collect(),
        ArrowType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(|v| v.map_or(CellValue::Null, |s| CellValue::String(Cow::Owned(s.to_string()))))
            .collect(),
        ArrowType::Date32 => array
            .as_primitive::<Date32Type>()
            .iter()
            .map(|v| match v {
                None => Ok(CellValue::Null),
                Some(days) => days
                    .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                    .and_then(NaiveDate::from_num_days_from_ce_opt)
                    .map(CellValue::Date)
                    .ok_or_else(|| CodecError::Unsupported {
                        column: column.to_string(),
                        reason: format!("date {} out of range", days),
                    }),
            })
            .collect::<Result<_, _>>()?,
        ArrowType::Date64 => timestamp_cells(
            array.as_primitive::<Date64Type>().iter(),
            DateTime::<Utc>::from_timestamp_millis,
            column,
        )?
        .into_iter()
        .map(|cell| match cell {
            CellValue::DateTime(dt) => CellValue::Date(dt.date()),
            other => other,
        })
        .collect(),
        ArrowType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => timestamp_cells(
                array.as_primitive::<TimestampSecondType>().iter(),
                |s| DateTime::<Utc>::from_timestamp(s, 0),
                column,
            )?,
            TimeUnit::Millisecond => timestamp_cells(
                array.as_primitive::<TimestampMillisecondType>().iter(),
                DateTime::<Utc>::from_timestamp_millis,
                column,
            )?,
            TimeUnit::Microsecond => timestamp_cells(
                array.as_primitive::<TimestampMicrosecondType>().iter(),
                DateTime::<Utc>::from_timestamp_micros,
                column,
            )?,
            TimeUnit::Nanosecond => timestamp_cells(
                array.as_primitive::<TimestampNanosecondType>().iter(),
                |ns| Some(DateTime::from_timestamp_nanos(ns)),
                column,
            )?,
        },
        _ => {
            // Fallback: convert to string
            let formatter = arrow::util::display::ArrayFormatter::try_new(
                array.as_ref(),
                &arrow::util::display::FormatOptions::default(),
            )?;
            (0..array.len())
                .map(|i| {
                    if array.is_null(i) {
                        CellValue::Null
                    } else {
                        CellValue::String(Cow::Owned(formatter.value(i).to_string()))
                    }
                })
                .collect()
        }
    };
    Ok(cells)
}
