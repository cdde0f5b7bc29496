// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Parquet checkpoint codec.
//!
//! Each column is typed from its non-null values: all strings become `Utf8`,
//! all integers `Int64`, all numbers `Float64`, all booleans `Boolean`.
//! Anything else (lists, objects, mixed values) is stored as JSON text in a
//! `Utf8` column whose field metadata carries `json = true`, so it decodes
//! back to the same JSON value. A table without columns encodes to zero bytes.

use crate::errors::TableError;
use crate::table::{Row, Table};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

const JSON_METADATA_KEY: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Utf8,
    Int64,
    Float64,
    Boolean,
    Json,
}

fn column_kind(table: &Table, column: &str) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in table.rows().iter().filter_map(|r| r.get(column)) {
        let this = match value {
            Value::Null => continue,
            Value::String(_) => ColumnKind::Utf8,
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Number(n) if n.is_i64() => ColumnKind::Int64,
            Value::Number(_) => ColumnKind::Float64,
            Value::Array(_) | Value::Object(_) => return ColumnKind::Json,
        };
        kind = Some(match (kind, this) {
            (None, this) => this,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int64), ColumnKind::Float64)
            | (Some(ColumnKind::Float64), ColumnKind::Int64) => ColumnKind::Float64,
            _ => return ColumnKind::Json,
        });
    }
    kind.unwrap_or(ColumnKind::Utf8)
}

fn build_column(table: &Table, column: &str, kind: ColumnKind) -> Result<ArrayRef, TableError> {
    let cells = table
        .rows()
        .iter()
        .map(|r| r.get(column).filter(|v| !v.is_null()));
    let array: ArrayRef = match kind {
        ColumnKind::Utf8 => Arc::new(
            cells
                .map(|v| v.and_then(Value::as_str))
                .collect::<StringArray>(),
        ),
        ColumnKind::Int64 => Arc::new(cells.map(|v| v.and_then(Value::as_i64)).collect::<Int64Array>()),
        ColumnKind::Float64 => Arc::new(
            cells
                .map(|v| v.and_then(Value::as_f64))
                .collect::<Float64Array>(),
        ),
        ColumnKind::Boolean => Arc::new(
            cells
                .map(|v| v.and_then(Value::as_bool))
                .collect::<BooleanArray>(),
        ),
        ColumnKind::Json => {
            let encoded = cells
                .map(|v| v.map(serde_json::to_string).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(StringArray::from(encoded))
        }
    };
    Ok(array)
}

/// Encodes `table` as a snappy-compressed Parquet file.
pub fn encode(table: &Table) -> Result<Vec<u8>, TableError> {
    if table.columns().is_empty() {
        return Ok(Vec::new());
    }

    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays = Vec::with_capacity(table.columns().len());
    for column in table.columns() {
        let kind = column_kind(table, column);
        let (data_type, metadata) = match kind {
            ColumnKind::Utf8 => (DataType::Utf8, None),
            ColumnKind::Int64 => (DataType::Int64, None),
            ColumnKind::Float64 => (DataType::Float64, None),
            ColumnKind::Boolean => (DataType::Boolean, None),
            ColumnKind::Json => (
                DataType::Utf8,
                Some(HashMap::from([(
                    JSON_METADATA_KEY.to_string(),
                    "true".to_string(),
                )])),
            ),
        };
        let field = Field::new(column, data_type, true);
        fields.push(match metadata {
            Some(metadata) => field.with_metadata(metadata),
            None => field,
        });
        arrays.push(build_column(table, column, kind)?);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(Arc::clone(&schema), arrays)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buffer)
}

/// Decodes a file written by [`encode`]; every row carries every column.
pub fn decode(bytes: &[u8]) -> Result<Table, TableError> {
    if bytes.is_empty() {
        return Ok(Table::new());
    }

    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build()?;

    let mut table = Table::with_columns(schema.fields().iter().map(|f| f.name().clone()));
    for batch in reader {
        let batch = batch?;
        let mut rows = vec![Row::new(); batch.num_rows()];
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let json = field
                .metadata()
                .get(JSON_METADATA_KEY)
                .is_some_and(|v| v == "true");
            for (i, row) in rows.iter_mut().enumerate() {
                row.insert(field.name().clone(), cell(field, array.as_ref(), i, json)?);
            }
        }
        for row in rows {
            table.push(row);
        }
    }
    Ok(table)
}

fn downcast<'a, T: 'static>(field: &Field, array: &'a dyn Array) -> Result<&'a T, TableError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| TableError::UnsupportedType {
            column: field.name().clone(),
            data_type: field.data_type().to_string(),
        })
}

fn cell(field: &Field, array: &dyn Array, i: usize, json: bool) -> Result<Value, TableError> {
    if array.is_null(i) {
        return Ok(Value::Null);
    }
    let text = |s: &str| -> Result<Value, TableError> {
        if json {
            Ok(serde_json::from_str(s)?)
        } else {
            Ok(Value::String(s.to_string()))
        }
    };
    match field.data_type() {
        DataType::Utf8 => text(downcast::<StringArray>(field, array)?.value(i)),
        DataType::LargeUtf8 => text(downcast::<LargeStringArray>(field, array)?.value(i)),
        DataType::Int64 => Ok(Value::from(downcast::<Int64Array>(field, array)?.value(i))),
        DataType::Int32 => Ok(Value::from(downcast::<Int32Array>(field, array)?.value(i))),
        DataType::Float64 => Ok(float(downcast::<Float64Array>(field, array)?.value(i))),
        DataType::Float32 => Ok(float(f64::from(
            downcast::<Float32Array>(field, array)?.value(i),
        ))),
        DataType::Boolean => Ok(Value::Bool(downcast::<BooleanArray>(field, array)?.value(i))),
        other => Err(TableError::UnsupportedType {
            column: field.name().clone(),
            data_type: other.to_string(),
        }),
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use serde_json::json;

    #[test]
    fn test_typed_columns_survive_a_checkpoint() {
        let table = Table::from_rows(vec![
            row! {"id" => "a", "count" => 3, "score" => 0.5, "flag" => true, "ids" => ["x", "y"]},
            row! {"id" => "b", "count" => 4, "score" => 1, "flag" => false, "ids" => []},
        ]);

        let decoded = decode(&encode(&table).unwrap()).unwrap();

        assert_eq!(decoded.columns(), table.columns());
        assert_eq!(decoded.rows()[0]["count"], json!(3));
        assert_eq!(decoded.rows()[1]["score"], json!(1.0));
        assert_eq!(decoded.rows()[0]["flag"], json!(true));
        assert_eq!(decoded.rows()[0]["ids"], json!(["x", "y"]));
        assert_eq!(decoded.rows()[1]["ids"], json!([]));
    }

    #[test]
    fn test_missing_cells_decode_as_null() {
        let table = Table::from_rows(vec![row! {"id" => "a"}, row! {"id" => "b", "note" => "n"}]);
        let decoded = decode(&encode(&table).unwrap()).unwrap();
        assert_eq!(decoded.rows()[0]["note"], Value::Null);
        assert_eq!(decoded.rows()[1]["note"], json!("n"));
    }

    #[test]
    fn test_column_kinds() {
        let table = Table::from_rows(vec![
            row! {"mixed" => 1, "nums" => 1, "text" => "a", "nulls" => null},
            row! {"mixed" => "x", "nums" => 2.5, "text" => null, "nulls" => null},
        ]);
        let cases = vec![
            ("mixed", ColumnKind::Json),
            ("nums", ColumnKind::Float64),
            ("text", ColumnKind::Utf8),
            ("nulls", ColumnKind::Utf8),
        ];
        for (column, expected) in cases {
            assert_eq!(column_kind(&table, column), expected, "{}", column);
        }
    }

    #[test]
    fn test_empty_tables() {
        assert!(encode(&Table::new()).unwrap().is_empty());
        assert_eq!(decode(&[]).unwrap(), Table::new());

        let schema_only = Table::with_columns(["id", "text"]);
        let decoded = decode(&encode(&schema_only).unwrap()).unwrap();
        assert_eq!(decoded.columns(), &["id", "text"]);
        assert!(decoded.is_empty());
    }
}
