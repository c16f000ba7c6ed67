use rusqlite::types::Value;

use crate::error::DaoError;
use crate::row::RowShape;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns an execution failure if the value cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, DaoError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

pub(crate) fn row_shape(stmt: &rusqlite::Statement<'_>) -> RowShape {
    RowShape::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

pub(crate) fn extract_row(row: &rusqlite::Row, width: usize) -> Result<Vec<RowValues>, DaoError> {
    (0..width)
        .map(|idx| sqlite_extract_value_sync(row, idx))
        .collect()
}

/// Read the first column of a `RETURNING` row as a generated key.
pub(crate) fn integer_key(row: &rusqlite::Row) -> Result<i64, DaoError> {
    match sqlite_extract_value_sync(row, 0)? {
        RowValues::Int(key) => Ok(key),
        other => Err(DaoError::execution(format!(
            "generated key is not an integer: {other:?}"
        ))),
    }
}
