//! Helper utilities for testing mappers.

use crate::row::DbRow;
use crate::types::RowValues;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: &[&str], values: Vec<RowValues>) -> DbRow {
    DbRow::new(
        column_names.iter().map(|name| (*name).to_owned()).collect(),
        values,
    )
}
