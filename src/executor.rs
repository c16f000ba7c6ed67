//! The generic executor: one statement, one connection lifetime per call.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::Endpoint;
use crate::error::DaoError;
use crate::row::DbRow;
use crate::store::{self, Store, StoreConnection, Visit};
use crate::types::RowValues;

/// Runs parameterized statements against a [`Store`] and maps rows into caller types.
///
/// Every operation opens its own connection, binds `values` by 1-based position,
/// runs the statement, and closes the connection before returning, whatever the
/// outcome. Cloning is cheap and clones share only the immutable store.
///
/// ```rust,no_run
/// use sql_dao::prelude::*;
///
/// #[derive(Debug)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// fn user(row: &DbRow) -> Result<User, DaoError> {
///     Ok(User { id: row.try_int(0)?, name: row.try_text(1)? })
/// }
///
/// # async fn run() -> Result<(), DaoError> {
/// let executor = Executor::from_endpoint(&Endpoint::from_env()?)?;
/// let adults = executor
///     .load_many("SELECT id, name FROM users WHERE age > ?", &row_values![18], user)
///     .await?;
/// let id = executor
///     .create("INSERT INTO users(name) VALUES (?)", &row_values!["Alice"])
///     .await?;
/// # let _ = (adults, id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn Store>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("store", &self.store)
            .finish()
    }
}

impl Executor {
    /// Build an executor over an injected store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Build an executor for the store an endpoint points at.
    ///
    /// # Errors
    /// Returns an initialization failure if the endpoint's backend is unavailable
    /// or its driver configuration is invalid.
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self, DaoError> {
        Ok(Self::new(store::open(endpoint)?))
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Map every row, in cursor order. No rows yields an empty `Vec`.
    ///
    /// # Errors
    /// Returns an execution failure for driver or binding errors, or whatever the mapper returns.
    pub async fn load_many<T, F>(
        &self,
        sql: &str,
        values: &[RowValues],
        mut mapper: F,
    ) -> Result<Vec<T>, DaoError>
    where
        F: FnMut(&DbRow) -> Result<T, DaoError> + Send,
        T: Send,
    {
        let mut conn = self.acquire(Operation::LoadMany, sql, values.len()).await?;
        let mut entities = Vec::new();
        let outcome = {
            let mut visit = |row: &DbRow| -> Result<Visit, DaoError> {
                entities.push(mapper(row)?);
                Ok(Visit::Continue)
            };
            conn.query(sql, values, &mut visit).await
        };
        release(Operation::LoadMany, conn, outcome).await?;
        debug!(operation = %Operation::LoadMany, rows = entities.len(), "statement complete");
        Ok(entities)
    }

    /// Map the first row only; later rows are never read.
    ///
    /// # Errors
    /// Returns a not-found failure if the query yields no rows, an execution failure
    /// for driver or binding errors, or whatever the mapper returns.
    pub async fn load_one<T, F>(
        &self,
        sql: &str,
        values: &[RowValues],
        mut mapper: F,
    ) -> Result<T, DaoError>
    where
        F: FnMut(&DbRow) -> Result<T, DaoError> + Send,
        T: Send,
    {
        let mut conn = self.acquire(Operation::LoadOne, sql, values.len()).await?;
        let mut first = None;
        let queried = {
            let mut visit = |row: &DbRow| -> Result<Visit, DaoError> {
                first = Some(mapper(row)?);
                Ok(Visit::Stop)
            };
            conn.query(sql, values, &mut visit).await
        };
        let outcome = queried.and_then(|()| {
            first.ok_or_else(|| DaoError::not_found("query returned no matching entity"))
        });
        let entity = release(Operation::LoadOne, conn, outcome).await?;
        debug!(operation = %Operation::LoadOne, "statement complete");
        Ok(entity)
    }

    /// Run an insert and return the first generated key.
    ///
    /// # Errors
    /// Returns a no-effect failure if no row was inserted (checked first), a
    /// no-identifier failure if the store produced no key, or an execution failure.
    pub async fn create(&self, sql: &str, values: &[RowValues]) -> Result<i64, DaoError> {
        let mut conn = self.acquire(Operation::Create, sql, values.len()).await?;
        let outcome = conn.insert(sql, values).await.and_then(|inserted| {
            if inserted.rows_affected == 0 {
                return Err(DaoError::no_effect("create failed, no rows affected"));
            }
            inserted
                .generated_key
                .map(|id| (inserted.rows_affected, id))
                .ok_or_else(|| DaoError::no_identifier("create failed, no generated key returned"))
        });
        let (rows_affected, id) = release(Operation::Create, conn, outcome).await?;
        debug!(operation = %Operation::Create, rows_affected, id, "statement complete");
        Ok(id)
    }

    /// Run a mutating statement that must change at least one row.
    ///
    /// # Errors
    /// Returns a no-effect failure if zero rows were affected, or an execution failure.
    pub async fn update(&self, sql: &str, values: &[RowValues]) -> Result<(), DaoError> {
        self.execute_expecting_rows(Operation::Update, sql, values).await
    }

    /// Run one statement once per value sequence; every unit must change at least one row.
    ///
    /// All units are executed before any count is inspected. Units the store already
    /// applied stay applied when a later unit reports zero rows. A unit whose value
    /// count does not match the statement fails the call before any unit runs.
    ///
    /// # Errors
    /// Returns a no-effect failure naming the first unit that affected zero rows,
    /// or an execution failure.
    pub async fn batch_update(
        &self,
        sql: &str,
        units: &[Vec<RowValues>],
    ) -> Result<(), DaoError> {
        let mut conn = self.acquire(Operation::BatchUpdate, sql, units.len()).await?;
        let outcome = conn.execute_batch(sql, units).await.and_then(|counts| {
            match counts.iter().position(|&count| count == 0) {
                Some(unit) => Err(DaoError::no_effect(format!(
                    "batch update failed, unit {unit} of {} affected no rows",
                    counts.len()
                ))),
                None => Ok(counts.len()),
            }
        });
        let applied = release(Operation::BatchUpdate, conn, outcome).await?;
        debug!(operation = %Operation::BatchUpdate, units = applied, "statement complete");
        Ok(())
    }

    /// Run a deletion that must remove at least one row.
    ///
    /// # Errors
    /// Returns a no-effect failure if zero rows were affected, or an execution failure.
    pub async fn delete(&self, sql: &str, values: &[RowValues]) -> Result<(), DaoError> {
        self.execute_expecting_rows(Operation::Delete, sql, values).await
    }

    async fn execute_expecting_rows(
        &self,
        operation: Operation,
        sql: &str,
        values: &[RowValues],
    ) -> Result<(), DaoError> {
        let mut conn = self.acquire(operation, sql, values.len()).await?;
        let outcome = conn.execute(sql, values).await.and_then(|affected| {
            if affected == 0 {
                Err(DaoError::no_effect(format!(
                    "{operation} failed, no rows affected"
                )))
            } else {
                Ok(affected)
            }
        });
        let affected = release(operation, conn, outcome).await?;
        debug!(operation = %operation, rows_affected = affected, "statement complete");
        Ok(())
    }

    async fn acquire(
        &self,
        operation: Operation,
        sql: &str,
        bound: usize,
    ) -> Result<Box<dyn StoreConnection>, DaoError> {
        if sql.trim().is_empty() {
            return Err(DaoError::execution(format!(
                "{operation} called with empty statement text"
            )));
        }
        debug!(operation = %operation, bound, "executing statement");
        trace!(operation = %operation, sql, "statement text");
        self.store.connect().await
    }
}

/// Close `conn`, keeping the first failure.
///
/// `outcome` must already be final: not-found and no-effect results are decided
/// before the connection is released, so a close failure cannot replace them.
async fn release<R>(
    operation: Operation,
    conn: Box<dyn StoreConnection>,
    outcome: Result<R, DaoError>,
) -> Result<R, DaoError> {
    let closed = conn.close().await;
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(
                operation = %operation,
                error = %close_err,
                "connection release failed after an earlier error"
            );
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    LoadMany,
    LoadOne,
    Create,
    Update,
    BatchUpdate,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::LoadMany => "load many",
            Operation::LoadOne => "load one",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::BatchUpdate => "batch update",
            Operation::Delete => "delete",
        })
    }
}
