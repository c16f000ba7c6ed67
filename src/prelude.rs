//! Convenient imports for repositories built on the executor.

pub use crate::config::{Endpoint, EndpointArgs};
pub use crate::error::{DaoError, ErrorKind};
pub use crate::executor::Executor;
pub use crate::row::DbRow;
pub use crate::row_values;
pub use crate::store::Store;
pub use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresStore;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteStore};
