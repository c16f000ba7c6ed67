//! Connection-per-call SQL execution with positional binding and row mappers.
//!
//! An [`Executor`] opens a connection for every call, binds values by 1-based
//! position, runs one statement, maps rows with a caller-supplied function, and
//! closes everything before returning. Failures come back as a single
//! [`DaoError`] whose [`ErrorKind`] tells not-found and no-effect outcomes apart
//! from driver failures.
//!
//! Backends are selected by cargo feature: `sqlite` (rusqlite) and `postgres`
//! (tokio-postgres). The `test-utils` feature adds a scripted in-memory store.

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod row;
pub mod store;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{Endpoint, EndpointArgs};
pub use error::{DaoError, ErrorKind, StoreError};
pub use executor::Executor;
pub use row::DbRow;
pub use store::{InsertOutcome, RowVisitor, Store, StoreConnection, Visit};
pub use types::{DatabaseType, RowValues};
