use std::fmt;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::DaoError;
use crate::types::DatabaseType;

/// Environment variable consulted by [`Endpoint::from_env`] and [`EndpointArgs`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// The store's connection endpoint, resolved once at startup and read-only afterwards.
///
/// Accepted forms are `sqlite:<path>`, `sqlite://<path>` (`:memory:` allowed) and
/// `postgres://…` / `postgresql://…`.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    database_type: DatabaseType,
}

impl Endpoint {
    /// Validate a connection string.
    ///
    /// # Errors
    /// Returns an initialization failure for empty, unrecognized or malformed values.
    pub fn parse(url: &str) -> Result<Self, DaoError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DaoError::initialization("database endpoint is empty"));
        }

        let database_type = if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::Postgres
        } else if url.starts_with("sqlite:") {
            DatabaseType::Sqlite
        } else {
            // Keep the value itself out of the message; it may carry credentials.
            let scheme = url.split(':').next().unwrap_or_default();
            return Err(DaoError::initialization(format!(
                "unsupported database endpoint scheme `{scheme}`"
            )));
        };

        let endpoint = Self {
            url: url.to_owned(),
            database_type,
        };
        if database_type == DatabaseType::Sqlite && endpoint.sqlite_path().is_none() {
            return Err(DaoError::initialization(
                "sqlite endpoint does not name a database file",
            ));
        }
        Ok(endpoint)
    }

    /// Read the endpoint from `DATABASE_URL`.
    ///
    /// # Errors
    /// Returns an initialization failure if the variable is unset or invalid.
    pub fn from_env() -> Result<Self, DaoError> {
        let url = std::env::var(DATABASE_URL_ENV).map_err(|e| {
            DaoError::initialization(format!("{DATABASE_URL_ENV} is not usable: {e}"))
        })?;
        Self::parse(&url)
    }

    /// Read the `db.url` setting from a TOML configuration file.
    ///
    /// ```toml
    /// [db]
    /// url = "sqlite:data/app.db"
    /// ```
    ///
    /// # Errors
    /// Returns an initialization failure if the file cannot be read or parsed,
    /// or if `db.url` is missing or invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, DaoError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DaoError::initialization(format!("cannot read {}", path.display())).with_source(e)
        })?;
        let settings: Settings = toml::from_str(&raw).map_err(|e| {
            DaoError::initialization(format!("cannot parse {}", path.display())).with_source(e)
        })?;
        let url = settings
            .db
            .and_then(|db| db.url)
            .ok_or_else(|| {
                DaoError::initialization(format!("db.url is missing from {}", path.display()))
            })?;
        Self::parse(&url)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    /// The database path of a `sqlite:` endpoint.
    #[must_use]
    pub fn sqlite_path(&self) -> Option<&str> {
        if self.database_type != DatabaseType::Sqlite {
            return None;
        }
        let rest = self.url.strip_prefix("sqlite:")?;
        let path = rest.strip_prefix("//").unwrap_or(rest);
        (!path.is_empty()).then_some(path)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("database_type", &self.database_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Settings {
    db: Option<DbSettings>,
}

#[derive(Debug, Deserialize)]
struct DbSettings {
    url: Option<String>,
}

/// Command-line / environment sources for the endpoint; flatten into an application's parser.
#[derive(Parser, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Connection string, e.g. `sqlite:app.db` or `postgres://user@host/db`
    #[arg(long, env = DATABASE_URL_ENV, hide_env_values = true)]
    pub database_url: Option<String>,
    /// TOML file with a `[db] url = "…"` setting
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl EndpointArgs {
    /// Resolve the endpoint, preferring an explicit URL over the configuration file.
    ///
    /// # Errors
    /// Returns an initialization failure if neither source yields a valid endpoint.
    pub fn resolve(&self) -> Result<Endpoint, DaoError> {
        match (&self.database_url, &self.config) {
            (Some(url), _) => Endpoint::parse(url),
            (None, Some(path)) => Endpoint::from_config_file(path),
            (None, None) => Err(DaoError::initialization(format!(
                "no database endpoint configured (set --database-url, {DATABASE_URL_ENV} or --config)"
            ))),
        }
    }
}
