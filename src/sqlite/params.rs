use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::{DaoError, check_param_count};
use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Unified `SQLite` parameter container.
#[derive(Debug, Clone, PartialEq)]
pub struct Params(pub Vec<Value>);

impl Params {
    /// Convert middleware row values into `SQLite` values, preserving order.
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Self {
        Params(params.iter().map(row_value_to_sqlite_value).collect())
    }

    /// Borrow the underlying values.
    #[must_use]
    pub fn as_values(&self) -> &[Value] {
        &self.0
    }
}

/// Bind `values` to `stmt` by 1-based position.
///
/// # Errors
/// Returns an execution failure if the statement's placeholder count differs
/// from the number of values, or if rusqlite rejects a binding.
pub fn bind_values(stmt: &mut Statement<'_>, values: &[RowValues]) -> Result<(), DaoError> {
    check_param_count(stmt.parameter_count(), values.len())?;
    bind_params(stmt, Params::convert(values))
}

/// Bind already converted values by 1-based position.
///
/// The caller is responsible for matching `params` to the placeholder count.
///
/// # Errors
/// Returns an execution failure if rusqlite rejects a binding.
pub fn bind_params(stmt: &mut Statement<'_>, params: Params) -> Result<(), DaoError> {
    for (position, value) in params.0.into_iter().enumerate() {
        stmt.raw_bind_parameter(position + 1, value)?;
    }
    Ok(())
}
