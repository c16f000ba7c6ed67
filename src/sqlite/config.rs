use std::time::Duration;

use async_trait::async_trait;
use rusqlite::OpenFlags;

use crate::config::Endpoint;
use crate::error::DaoError;
use crate::store::{Store, StoreConnection};

use super::connection::SqliteConnection;

/// Options for opening `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Create the database file when it does not exist yet.
    pub create_if_missing: bool,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            create_if_missing: true,
            busy_timeout: None,
        }
    }

    /// Options for a `sqlite:` endpoint.
    ///
    /// # Errors
    /// Returns an initialization failure if the endpoint is not a `SQLite` one.
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self, DaoError> {
        endpoint
            .sqlite_path()
            .map(|path| Self::new(path.to_owned()))
            .ok_or_else(|| DaoError::initialization("endpoint is not a sqlite endpoint"))
    }

    pub(crate) fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.opts.create_if_missing = create;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build the store.
    #[must_use]
    pub fn build(self) -> SqliteStore {
        SqliteStore::new(self.finish())
    }
}

/// Opens a new `rusqlite` connection for every executor call.
///
/// Statements run synchronously on the task that awaits the executor call, so
/// a long query or a lock wait holds that runtime worker thread until it ends.
/// Keep `busy_timeout` short on a shared multi-threaded runtime.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    options: SqliteOptions,
}

impl SqliteStore {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.options
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, DaoError> {
        let conn = SqliteConnection::open(&self.options)?;
        Ok(Box::new(conn))
    }
}
