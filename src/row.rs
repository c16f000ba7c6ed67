use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::DaoError;
use crate::types::RowValues;

/// One positioned row from a result cursor, handed to a mapper.
///
/// Column names are shared across every row of the same statement. Positional
/// accessors are 0-based, in select-list order.
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row (shared across all rows of a statement)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

/// Column names plus a name → index cache, built once per statement.
#[derive(Debug, Clone)]
pub(crate) struct RowShape {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl RowShape {
    pub(crate) fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self {
            names: Arc::new(names),
            index: Arc::new(index),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn row(&self, values: Vec<RowValues>) -> DbRow {
        DbRow {
            column_names: Arc::clone(&self.names),
            values,
            column_index: Arc::clone(&self.index),
        }
    }
}

impl DbRow {
    /// Create a row from column names and values.
    #[must_use]
    pub fn new(column_names: Vec<String>, values: Vec<RowValues>) -> Self {
        RowShape::new(column_names).row(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index.get(column_name) {
            return Some(idx);
        }
        // Drivers may report a different case than the select list used
        self.column_names
            .iter()
            .position(|col| col.eq_ignore_ascii_case(column_name))
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by 0-based column position
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    fn value(&self, index: usize) -> Result<&RowValues, DaoError> {
        self.values.get(index).ok_or_else(|| {
            DaoError::execution(format!(
                "column {index} out of range for a row of {} column(s)",
                self.values.len()
            ))
        })
    }

    fn mismatch(&self, index: usize, expected: &str) -> DaoError {
        let name = self
            .column_names
            .get(index)
            .map_or("?", String::as_str);
        DaoError::execution(format!(
            "column {index} ({name}) is not {expected}: {:?}",
            self.values.get(index)
        ))
    }

    /// # Errors
    /// Returns an execution failure if the column is missing or not an integer.
    pub fn try_int(&self, index: usize) -> Result<i64, DaoError> {
        self.value(index)?
            .as_int()
            .copied()
            .ok_or_else(|| self.mismatch(index, "an integer"))
    }

    /// # Errors
    /// Returns an execution failure if the column is missing or not text.
    pub fn try_text(&self, index: usize) -> Result<String, DaoError> {
        self.value(index)?
            .as_text()
            .map(str::to_owned)
            .ok_or_else(|| self.mismatch(index, "text"))
    }

    /// # Errors
    /// Returns an execution failure if the column is missing or not numeric.
    pub fn try_float(&self, index: usize) -> Result<f64, DaoError> {
        self.value(index)?
            .as_float()
            .ok_or_else(|| self.mismatch(index, "a float"))
    }

    /// # Errors
    /// Returns an execution failure if the column is missing or not a boolean.
    pub fn try_bool(&self, index: usize) -> Result<bool, DaoError> {
        self.value(index)?
            .as_bool()
            .copied()
            .ok_or_else(|| self.mismatch(index, "a boolean"))
    }

    /// # Errors
    /// Returns an execution failure if the column is missing or not a timestamp.
    pub fn try_timestamp(&self, index: usize) -> Result<NaiveDateTime, DaoError> {
        self.value(index)?
            .as_timestamp()
            .ok_or_else(|| self.mismatch(index, "a timestamp"))
    }

    /// # Errors
    /// Returns an execution failure if the column is missing or not a blob.
    pub fn try_blob(&self, index: usize) -> Result<Vec<u8>, DaoError> {
        self.value(index)?
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| self.mismatch(index, "a blob"))
    }

    /// Nullable variant of [`DbRow::try_text`].
    ///
    /// # Errors
    /// Returns an execution failure if the column is missing or neither NULL nor text.
    pub fn try_opt_text(&self, index: usize) -> Result<Option<String>, DaoError> {
        if self.value(index)?.is_null() {
            Ok(None)
        } else {
            self.try_text(index).map(Some)
        }
    }

    /// Nullable variant of [`DbRow::try_int`].
    ///
    /// # Errors
    /// Returns an execution failure if the column is missing or neither NULL nor an integer.
    pub fn try_opt_int(&self, index: usize) -> Result<Option<i64>, DaoError> {
        if self.value(index)?.is_null() {
            Ok(None)
        } else {
            self.try_int(index).map(Some)
        }
    }
}
