//! Row-level conversions between SQLite rows and core types.

use rusqlite::Row;
use rusqlite::types::Value;
use sdif_core::{ColumnMetadata, Source, SourceId, TableMetadata};

use crate::error::{ContainerError, Result};

pub(crate) const SOURCE_COLUMNS: &str = "source_id, original_file_name, original_file_type, \
     source_description, processing_timestamp";

pub(crate) fn row_to_source(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        id: SourceId(row.get(0)?),
        file_name: row.get(1)?,
        file_type: row.get(2)?,
        description: row.get(3)?,
        processing_timestamp: row.get(4)?,
    })
}

pub(crate) const TABLE_METADATA_COLUMNS: &str =
    "table_name, source_id, description, original_identifier, row_count";

pub(crate) fn row_to_table_metadata(row: &Row<'_>) -> rusqlite::Result<TableMetadata> {
    Ok(TableMetadata {
        table_name: row.get(0)?,
        source_id: SourceId(row.get(1)?),
        description: row.get(2)?,
        original_identifier: row.get(3)?,
        row_count: row.get(4)?,
    })
}

pub(crate) fn row_to_column_metadata(row: &Row<'_>) -> rusqlite::Result<ColumnMetadata> {
    Ok(ColumnMetadata {
        table_name: row.get(0)?,
        column_name: row.get(1)?,
        description: row.get(2)?,
        original_column_name: row.get(3)?,
    })
}

/// Parses JSON stored in a metadata column.
pub(crate) fn parse_json(raw: &str, location: impl Into<String>) -> Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| ContainerError::malformed(location, e))
}

/// Parses an optional JSON column, treating SQL NULL as absent.
pub(crate) fn parse_optional_json(
    raw: Option<String>,
    location: impl Into<String>,
) -> Result<Option<serde_json::Value>> {
    raw.map(|text| parse_json(&text, location)).transpose()
}

/// Serializes a JSON value for storage.
pub(crate) fn to_json_text(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Converts a stored cell to JSON. Blobs become lowercase hex strings and
/// non-finite reals become `null`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(v) => serde_json::Value::from(*v),
        Value::Real(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(v) => serde_json::Value::String(v.clone()),
        Value::Blob(bytes) => {
            serde_json::Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect())
        }
    }
}

/// Converts a JSON scalar into a storage value. Arrays and objects are
/// stored as their JSON text.
pub fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Real).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
