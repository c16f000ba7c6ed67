use std::fmt;

use thiserror::Error;

/// What went wrong, without having to read the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Endpoint configuration missing or invalid, or the backend is unavailable.
    Initialization,
    /// Any driver failure during connect, prepare, bind, execute, fetch or close.
    Execution,
    /// `load_one` found no rows.
    NotFound,
    /// A mutating statement affected zero rows.
    NoEffect,
    /// An insert succeeded but the store returned no generated key.
    NoIdentifier,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Initialization => "initialization failure",
            ErrorKind::Execution => "execution failure",
            ErrorKind::NotFound => "not found",
            ErrorKind::NoEffect => "no effect",
            ErrorKind::NoIdentifier => "no identifier",
        };
        f.write_str(label)
    }
}

/// Native causes carried by a [`DaoError`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// The single error type returned by every executor operation.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct DaoError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<StoreError>,
}

impl DaoError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<StoreError>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Initialization, message)
    }

    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn no_effect(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoEffect, message)
    }

    #[must_use]
    pub fn no_identifier(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoIdentifier, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped native cause, if the failure came from the driver or the environment.
    #[must_use]
    pub fn cause(&self) -> Option<&StoreError> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DaoError {
    fn from(err: rusqlite::Error) -> Self {
        DaoError::execution(format!("sqlite error: {err}")).with_source(err)
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DaoError {
    fn from(err: tokio_postgres::Error) -> Self {
        DaoError::execution(format!("postgres error: {err}")).with_source(err)
    }
}

/// Fail unless the statement declares exactly as many placeholders as there are values.
pub(crate) fn check_param_count(expected: usize, supplied: usize) -> Result<(), DaoError> {
    if expected == supplied {
        Ok(())
    } else {
        Err(DaoError::execution(format!(
            "statement expects {expected} bound value(s), {supplied} supplied"
        )))
    }
}
