//! The driver boundary.
//!
//! A [`Store`] opens one [`StoreConnection`] per executor call. Backends implement
//! both traits; tests substitute their own (see `test_utils::ScriptedStore`).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Endpoint;
use crate::error::DaoError;
use crate::row::DbRow;
use crate::types::{DatabaseType, RowValues};

/// Whether a row visitor wants the cursor to keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

/// Called once per row, in cursor order.
pub type RowVisitor<'a> = dyn FnMut(&DbRow) -> Result<Visit, DaoError> + Send + 'a;

/// What an insert reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOutcome {
    pub rows_affected: u64,
    /// First generated key, if the store produced one.
    pub generated_key: Option<i64>,
}

/// A source of single-use connections.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Open a fresh connection.
    ///
    /// # Errors
    /// Returns an execution failure wrapping the driver error when the store is unreachable.
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, DaoError>;
}

/// One open connection. Every method prepares, binds (1-based, in order) and
/// runs exactly one statement; prepared statements and cursors never outlive
/// the method call.
#[async_trait]
pub trait StoreConnection: Send {
    /// Run a query and feed rows to `visitor` until the cursor ends or the visitor stops.
    async fn query(
        &mut self,
        sql: &str,
        values: &[RowValues],
        visitor: &mut RowVisitor<'_>,
    ) -> Result<(), DaoError>;

    /// Run a mutating statement and return the affected-row count.
    async fn execute(&mut self, sql: &str, values: &[RowValues]) -> Result<u64, DaoError>;

    /// Run an insert and retrieve the generated key.
    async fn insert(&mut self, sql: &str, values: &[RowValues])
    -> Result<InsertOutcome, DaoError>;

    /// Run one statement once per unit and return each unit's affected-row count.
    async fn execute_batch(
        &mut self,
        sql: &str,
        units: &[Vec<RowValues>],
    ) -> Result<Vec<u64>, DaoError>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<(), DaoError>;
}

/// Build the store an endpoint points at.
///
/// # Errors
/// Returns an initialization failure if the endpoint's backend is not compiled in
/// or its driver configuration is invalid.
pub fn open(endpoint: &Endpoint) -> Result<Arc<dyn Store>, DaoError> {
    match endpoint.database_type() {
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => {
            let options = crate::sqlite::SqliteOptions::from_endpoint(endpoint)?;
            Ok(Arc::new(crate::sqlite::SqliteStore::new(options)))
        }
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => Ok(Arc::new(crate::postgres::PostgresStore::from_endpoint(
            endpoint,
        )?)),
        #[allow(unreachable_patterns)]
        other => Err(DaoError::initialization(format!(
            "support for {} endpoints is not compiled in",
            other.as_str()
        ))),
    }
}
