// PostgreSQL backend
//
// - config: the `Store` that opens connections from a parsed `tokio_postgres::Config`
// - params: `ToSql` for middleware values
// - query: value extraction from result rows
// - connection: the per-call `StoreConnection`

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::PostgresStore;
pub use connection::PostgresConnection;
pub use params::Params;
pub use query::postgres_extract_value;
pub use tokio_postgres;
