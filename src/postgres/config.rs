use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tokio_postgres::{Config as PgConfig, NoTls};

use crate::config::Endpoint;
use crate::error::DaoError;
use crate::store::{Store, StoreConnection};
use crate::types::DatabaseType;

use super::connection::PostgresConnection;

/// Opens a new `tokio_postgres` connection for every executor call.
///
/// Timeouts belong to the driver configuration, e.g. `?connect_timeout=5` on the URL.
#[derive(Clone)]
pub struct PostgresStore {
    config: PgConfig,
}

impl PostgresStore {
    #[must_use]
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    /// Parse a `postgres://` endpoint.
    ///
    /// # Errors
    /// Returns an initialization failure if the endpoint is not a Postgres one or
    /// `tokio_postgres` rejects it.
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self, DaoError> {
        if endpoint.database_type() != DatabaseType::Postgres {
            return Err(DaoError::initialization(
                "endpoint is not a postgres endpoint",
            ));
        }
        let config = PgConfig::from_str(endpoint.url()).map_err(|e| {
            DaoError::initialization(format!("malformed postgres endpoint: {e}")).with_source(e)
        })?;
        if config.get_dbname().is_none() {
            return Err(DaoError::initialization(
                "postgres endpoint does not name a database",
            ));
        }
        Ok(Self::new(config))
    }

    #[must_use]
    pub fn config(&self) -> &PgConfig {
        &self.config
    }
}

impl fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStore")
            .field("dbname", &self.config.get_dbname())
            .field("user", &self.config.get_user())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, DaoError> {
        let (client, connection) = self.config.connect(NoTls).await.map_err(|e| {
            DaoError::execution(format!("cannot connect to postgres: {e}")).with_source(e)
        })?;
        Ok(Box::new(PostgresConnection::new(client, connection)))
    }
}
