//! Result normalization
//!
//! Converts backend-native results into ordered JSON rows. Arrow batches from
//! the vector store and SQLite rows from the analytical store both come out as
//! `Row`s whose key order is the order the caller's schema lookup supplied.


use crate::ScopeError;
use arrow::array::{
    Array, BinaryArray, BooleanArray, FixedSizeListArray, Float16Array, Float32Array,
    Float64Array, Int8Array, Int16Array, Int32Array, Int64Array, LargeBinaryArray,
    LargeListArray, LargeStringArray, ListArray, StringArray, UInt8Array, UInt16Array,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde_json::{Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::fmt::Write as _;

/// A single result row with a deterministic column order
pub type Row = serde_json::Map<String, Value>;

/// Column names of a schema, in declared order
#[inline]
pub fn schema_columns(schema: &Schema) -> Vec<String> {
    schema.fields().iter().map(|f| f.name().clone()).collect()
}

/// Convert record batches into rows holding exactly `columns`, in that order.
///
/// Driver output order is not trusted; every column is looked up by name.
#[inline]
pub fn record_batches_to_rows(
    batches: &[RecordBatch],
    columns: &[String],
) -> Result<Vec<Row>, ScopeError> {
    let total = batches.iter().map(RecordBatch::num_rows).sum();
    let mut rows = Vec::with_capacity(total);
    for batch in batches {
        rows.extend(record_batch_rows(batch, columns)?);
    }
    Ok(rows)
}

/// Convert a single record batch into rows holding exactly `columns`
#[inline]
pub fn record_batch_rows(batch: &RecordBatch, columns: &[String]) -> Result<Vec<Row>, ScopeError> {
    let arrays = columns
        .iter()
        .map(|name| {
            batch
                .column_by_name(name)
                .ok_or_else(|| ScopeError::Backend(format!("Missing column {} in result", name)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    (0..batch.num_rows())
        .map(|row| {
            let mut out = Row::new();
            for (name, array) in columns.iter().zip(&arrays) {
                out.insert(name.clone(), arrow_value(array.as_ref(), row)?);
            }
            Ok(out)
        })
        .collect()
}

/// Convert one cell of an Arrow array into a JSON value.
///
/// Lists (including fixed-size vector columns) become JSON arrays, binary
/// data becomes a hex string and unhandled types use Arrow's display format.
#[inline]
pub fn arrow_value(array: &dyn Array, row: usize) -> Result<Value, ScopeError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(array)?.value(row)),
        DataType::Int8 => Value::from(downcast::<Int8Array>(array)?.value(row)),
        DataType::Int16 => Value::from(downcast::<Int16Array>(array)?.value(row)),
        DataType::Int32 => Value::from(downcast::<Int32Array>(array)?.value(row)),
        DataType::Int64 => Value::from(downcast::<Int64Array>(array)?.value(row)),
        DataType::UInt8 => Value::from(downcast::<UInt8Array>(array)?.value(row)),
        DataType::UInt16 => Value::from(downcast::<UInt16Array>(array)?.value(row)),
        DataType::UInt32 => Value::from(downcast::<UInt32Array>(array)?.value(row)),
        DataType::UInt64 => Value::from(downcast::<UInt64Array>(array)?.value(row)),
        DataType::Float16 => {
            float_value(f64::from(downcast::<Float16Array>(array)?.value(row).to_f32()))
        }
        DataType::Float32 => float_value(f64::from(downcast::<Float32Array>(array)?.value(row))),
        DataType::Float64 => float_value(downcast::<Float64Array>(array)?.value(row)),
        DataType::Utf8 => Value::String(downcast::<StringArray>(array)?.value(row).to_string()),
        DataType::LargeUtf8 => {
            Value::String(downcast::<LargeStringArray>(array)?.value(row).to_string())
        }
        DataType::Binary => Value::String(hex_string(downcast::<BinaryArray>(array)?.value(row))),
        DataType::LargeBinary => {
            Value::String(hex_string(downcast::<LargeBinaryArray>(array)?.value(row)))
        }
        DataType::FixedSizeList(_, _) => {
            list_value(downcast::<FixedSizeListArray>(array)?.value(row).as_ref())?
        }
        DataType::List(_) => list_value(downcast::<ListArray>(array)?.value(row).as_ref())?,
        DataType::LargeList(_) => {
            list_value(downcast::<LargeListArray>(array)?.value(row).as_ref())?
        }
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array, &options)
                .map_err(|e| ScopeError::Backend(format!("Failed to format value: {}", e)))?;
            Value::String(formatter.value(row).to_string())
        }
    };

    Ok(value)
}

fn list_value(values: &dyn Array) -> Result<Value, ScopeError> {
    (0..values.len())
        .map(|i| arrow_value(values, i))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn downcast<T: Array + 'static>(array: &dyn Array) -> Result<&T, ScopeError> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        ScopeError::Backend(format!("Unexpected array layout for {}", array.data_type()))
    })
}

/// Non-finite floats have no JSON representation and become `null`
fn float_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{:02x}", byte);
            out
        })
}

/// Convert SQLite rows, keeping each row's positional column order
#[inline]
pub fn sqlite_rows_to_rows(rows: &[SqliteRow]) -> Result<Vec<Row>, ScopeError> {
    rows.iter().map(sqlite_row).collect()
}

/// Convert one SQLite row, keeping its positional column order
#[inline]
pub fn sqlite_row(row: &SqliteRow) -> Result<Row, ScopeError> {
    let mut out = Row::new();
    for column in row.columns() {
        out.insert(
            column.name().to_string(),
            sqlite_value(row, column.ordinal())?,
        );
    }
    Ok(out)
}

/// Decode one SQLite cell according to its runtime storage class
#[inline]
pub fn sqlite_value(row: &SqliteRow, index: usize) -> Result<Value, ScopeError> {
    let type_name = {
        let raw = row.try_get_raw(index).map_err(decode_error)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match type_name.as_str() {
        "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(index).map_err(decode_error)?),
        "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(index).map_err(decode_error)?),
        "REAL" | "NUMERIC" => {
            float_value(row.try_get_unchecked::<f64, _>(index).map_err(decode_error)?)
        }
        "BLOB" => Value::String(hex_string(
            &row.try_get_unchecked::<Vec<u8>, _>(index)
                .map_err(decode_error)?,
        )),
        _ => Value::String(
            row.try_get_unchecked::<String, _>(index)
                .map_err(decode_error)?,
        ),
    };

    Ok(value)
}

fn decode_error(e: sqlx::Error) -> ScopeError {
    ScopeError::Backend(format!("Failed to decode value: {}", e))
}
