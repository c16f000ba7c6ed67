use std::fmt;

use async_trait::async_trait;

use crate::error::{DaoError, check_param_count};
use crate::store::{InsertOutcome, RowVisitor, StoreConnection, Visit};
use crate::types::RowValues;

use super::config::SqliteOptions;
use super::params::{Params, bind_params, bind_values};
use super::query::{extract_row, integer_key, row_shape};

/// A single-use `rusqlite` connection.
///
/// Work runs inline on the calling task and blocks its runtime worker thread for
/// the duration of each statement, including any `busy_timeout` wait. Prepared
/// statements and cursors are scoped to each method, so they are finalized
/// before the method returns.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open a connection with the given options.
    ///
    /// # Errors
    /// Returns an execution failure wrapping the `rusqlite` error if the file cannot be opened.
    pub fn open(options: &SqliteOptions) -> Result<Self, DaoError> {
        let conn = rusqlite::Connection::open_with_flags(&options.db_path, options.open_flags())
            .map_err(|e| {
                DaoError::execution(format!("cannot open sqlite database: {e}")).with_source(e)
            })?;
        if let Some(timeout) = options.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        Ok(Self { conn })
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .finish()
    }
}

#[async_trait]
impl StoreConnection for SqliteConnection {
    async fn query(
        &mut self,
        sql: &str,
        values: &[RowValues],
        visitor: &mut RowVisitor<'_>,
    ) -> Result<(), DaoError> {
        let mut stmt = self.conn.prepare(sql)?;
        bind_values(&mut stmt, values)?;
        let shape = row_shape(&stmt);
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let db_row = shape.row(extract_row(row, shape.len())?);
            if visitor(&db_row)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, values: &[RowValues]) -> Result<u64, DaoError> {
        let mut stmt = self.conn.prepare(sql)?;
        bind_values(&mut stmt, values)?;
        let affected = stmt.raw_execute()?;
        Ok(affected as u64)
    }

    async fn insert(
        &mut self,
        sql: &str,
        values: &[RowValues],
    ) -> Result<InsertOutcome, DaoError> {
        let mut stmt = self.conn.prepare(sql)?;
        bind_values(&mut stmt, values)?;

        let outcome = if stmt.column_count() > 0 {
            // INSERT ... RETURNING: the first returned column is the key
            let mut generated_key = None;
            {
                let mut rows = stmt.raw_query();
                while let Some(row) = rows.next()? {
                    if generated_key.is_none() {
                        generated_key = Some(integer_key(row)?);
                    }
                }
            }
            InsertOutcome {
                rows_affected: self.conn.changes() as u64,
                generated_key,
            }
        } else {
            let affected = stmt.raw_execute()?;
            // A fresh connection reports rowid 0 until something is inserted through it.
            let rowid = self.conn.last_insert_rowid();
            InsertOutcome {
                rows_affected: affected as u64,
                generated_key: (rowid != 0).then_some(rowid),
            }
        };
        Ok(outcome)
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        units: &[Vec<RowValues>],
    ) -> Result<Vec<u64>, DaoError> {
        let mut stmt = self.conn.prepare(sql)?;
        let expected = stmt.parameter_count();
        // Every unit is checked and converted before the first one runs.
        let mut queued = Vec::with_capacity(units.len());
        for unit in units {
            check_param_count(expected, unit.len())?;
            queued.push(Params::convert(unit));
        }
        let mut counts = Vec::with_capacity(queued.len());
        for params in queued {
            bind_params(&mut stmt, params)?;
            counts.push(stmt.raw_execute()? as u64);
        }
        Ok(counts)
    }

    async fn close(self: Box<Self>) -> Result<(), DaoError> {
        self.conn.close().map_err(|(_conn, e)| {
            DaoError::execution(format!("cannot close sqlite connection: {e}")).with_source(e)
        })
    }
}
