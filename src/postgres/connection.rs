use std::fmt;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{TryStreamExt, future::try_join_all, pin_mut};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Connection, Socket, tls::NoTlsStream};

use crate::error::{DaoError, check_param_count};
use crate::store::{InsertOutcome, RowVisitor, StoreConnection, Visit};
use crate::types::RowValues;

use super::params::Params;
use super::query::{extract_row, integer_key, row_shape};

type Driver = Pin<Box<dyn Future<Output = Result<(), tokio_postgres::Error>> + Send>>;

/// A single-use `tokio_postgres` connection.
///
/// The connection's I/O future is polled on the calling task together with each
/// request instead of being spawned, and is run to completion by `close`.
pub struct PostgresConnection {
    client: Client,
    driver: Option<Driver>,
}

impl PostgresConnection {
    pub(crate) fn new(client: Client, connection: Connection<Socket, NoTlsStream>) -> Self {
        Self {
            client,
            driver: Some(Box::pin(connection)),
        }
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("closed", &self.client.is_closed())
            .finish_non_exhaustive()
    }
}

/// Poll `work` to completion while keeping the connection's I/O moving.
async fn drive<R>(
    driver: &mut Option<Driver>,
    work: impl Future<Output = Result<R, DaoError>>,
) -> Result<R, DaoError> {
    let Some(connection) = driver.as_mut() else {
        return Err(DaoError::execution("postgres connection is closed"));
    };
    pin_mut!(work);
    let ended = tokio::select! {
        biased;
        out = &mut work => return out,
        ended = connection.as_mut() => ended,
    };
    *driver = None;
    match ended {
        Ok(()) => Err(DaoError::execution(
            "postgres connection closed before the statement completed",
        )),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl StoreConnection for PostgresConnection {
    async fn query(
        &mut self,
        sql: &str,
        values: &[RowValues],
        visitor: &mut RowVisitor<'_>,
    ) -> Result<(), DaoError> {
        let client = &self.client;
        let work = async move {
            let stmt = client.prepare(sql).await?;
            check_param_count(stmt.params().len(), values.len())?;
            let shape = row_shape(&stmt);
            let params = Params::convert(values);
            let stream = client
                .query_raw(&stmt, params.as_refs().iter().copied())
                .await?;
            pin_mut!(stream);
            while let Some(row) = stream.try_next().await? {
                let db_row = shape.row(extract_row(&row)?);
                if visitor(&db_row)? == Visit::Stop {
                    break;
                }
            }
            Ok::<(), DaoError>(())
        };
        drive(&mut self.driver, work).await
    }

    async fn execute(&mut self, sql: &str, values: &[RowValues]) -> Result<u64, DaoError> {
        let client = &self.client;
        let work = async move {
            let stmt = client.prepare(sql).await?;
            check_param_count(stmt.params().len(), values.len())?;
            let params = Params::convert(values);
            Ok::<u64, DaoError>(client.execute(&stmt, params.as_refs()).await?)
        };
        drive(&mut self.driver, work).await
    }

    async fn insert(
        &mut self,
        sql: &str,
        values: &[RowValues],
    ) -> Result<InsertOutcome, DaoError> {
        let client = &self.client;
        let work = async move {
            let stmt = client.prepare(sql).await?;
            check_param_count(stmt.params().len(), values.len())?;
            let params = Params::convert(values);
            let stream = client
                .query_raw(&stmt, params.as_refs().iter().copied())
                .await?;
            pin_mut!(stream);
            let mut generated_key = None;
            while let Some(row) = stream.try_next().await? {
                if generated_key.is_none() {
                    generated_key = Some(integer_key(&row)?);
                }
            }
            Ok::<InsertOutcome, DaoError>(InsertOutcome {
                rows_affected: stream.rows_affected().unwrap_or(0),
                generated_key,
            })
        };
        drive(&mut self.driver, work).await
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        units: &[Vec<RowValues>],
    ) -> Result<Vec<u64>, DaoError> {
        let client = &self.client;
        let work = async move {
            let stmt = client.prepare(sql).await?;
            let expected = stmt.params().len();
            let mut queued: Vec<Vec<&(dyn ToSql + Sync)>> = Vec::with_capacity(units.len());
            for unit in units {
                check_param_count(expected, unit.len())?;
                queued.push(Params::convert(unit).as_refs().to_vec());
            }
            // Requests are pipelined on the one connection.
            let counts =
                try_join_all(queued.iter().map(|refs| client.execute(&stmt, refs))).await?;
            Ok::<Vec<u64>, DaoError>(counts)
        };
        drive(&mut self.driver, work).await
    }

    async fn close(self: Box<Self>) -> Result<(), DaoError> {
        let PostgresConnection { client, driver } = *self;
        drop(client);
        if let Some(connection) = driver {
            connection.await.map_err(|e| {
                DaoError::execution(format!("cannot close postgres connection: {e}"))
                    .with_source(e)
            })?;
        }
        Ok(())
    }
}
