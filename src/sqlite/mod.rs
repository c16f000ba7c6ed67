// SQLite backend
//
// - config: connection options and the `Store` that opens connections
// - params: conversion from middleware values to rusqlite values and positional binding
// - query: value extraction from result rows
// - connection: the per-call `StoreConnection`

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder, SqliteStore};
pub use connection::SqliteConnection;
pub use params::{Params, bind_params, bind_values, row_value_to_sqlite_value};
pub use query::sqlite_extract_value_sync;
pub use rusqlite;
