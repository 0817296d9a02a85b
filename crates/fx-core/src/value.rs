//! Row cell values and the CSV cell codec.
//!
//! The downloader and the populator share this codec so a value written by
//! one is always readable by the other: empty string encodes SQL NULL,
//! binary cells are base64, and any cell over [`MAX_CELL_BYTES`] is logged
//! and written as an empty cell instead of failing the row.

use crate::error::{CoreError, CoreResult};
use crate::schema::{Column, ColumnType};
use crate::table_name::TableName;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDateTime;
use std::fmt;

/// Largest cell the transfer engine will carry, in bytes (32 KiB).
pub const MAX_CELL_BYTES: usize = 32 * 1024;

/// Suffix appended to the CSV header name of base64-encoded binary columns.
pub const BINARY_HEADER_SUFFIX: &str = "*b64";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One row cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Decimal(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Bytes(b) => f.write_str(&BASE64.encode(b)),
        }
    }
}

/// Render the CSV header name for a selected column.
pub fn header_name(column: &str, binary: bool) -> String {
    if binary {
        format!("{column}{BINARY_HEADER_SUFFIX}")
    } else {
        column.to_string()
    }
}

/// Strip the binary marker from a CSV header name. Returns the bare column
/// name and whether the marker was present.
pub fn parse_header_name(header: &str) -> (&str, bool) {
    match header.strip_suffix(BINARY_HEADER_SUFFIX) {
        Some(bare) => (bare, true),
        None => (header, false),
    }
}

/// Encode one cell for CSV output.
///
/// Oversized text and binary cells are replaced by an empty cell with a
/// warning naming the table, column, and size in KiB; the row itself
/// always survives.
pub fn encode_cell(table: &TableName, column: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        Value::Text(s) => {
            if s.len() <= MAX_CELL_BYTES {
                s.clone()
            } else {
                warn_too_large(table, column, s.len());
                String::new()
            }
        }
        Value::Bytes(b) => {
            if b.len() <= MAX_CELL_BYTES {
                BASE64.encode(b)
            } else {
                warn_too_large(table, column, b.len());
                String::new()
            }
        }
    }
}

fn warn_too_large(table: &TableName, column: &str, size: usize) {
    log::warn!(
        "Data too large in {}.{}: {} KiB",
        table.qualified_name(),
        column,
        size / 1024
    );
}

/// Decode one CSV cell into a value for the given target column.
///
/// The empty string decodes to NULL. Timestamp cells in an unrecognized
/// format are passed through as text for the engine to coerce.
pub fn decode_cell(column: &Column, raw: &str) -> CoreResult<Value> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    match column.column_type() {
        ColumnType::Varchar => Ok(Value::Text(raw.to_string())),
        ColumnType::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|e| {
            CoreError::CellDecode {
                column: column.name().to_string(),
                message: format!("not an integer ({e}): {raw}"),
            }
        }),
        ColumnType::BigDecimal => raw.parse::<f64>().map(Value::Decimal).map_err(|e| {
            CoreError::CellDecode {
                column: column.name().to_string(),
                message: format!("not a number ({e}): {raw}"),
            }
        }),
        ColumnType::Timestamp => Ok(parse_timestamp(raw)
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::Text(raw.to_string()))),
        ColumnType::Binary => BASE64.decode(raw).map(Value::Bytes).map_err(|e| {
            CoreError::CellDecode {
                column: column.name().to_string(),
                message: format!("invalid base64 ({e})"),
            }
        }),
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    raw.parse::<chrono::NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
