//! Helpers for testing repositories without a database.

pub mod scripted;
pub mod test_helpers;

pub use scripted::{ScriptedStore, StoreEvent};
pub use test_helpers::create_test_row;
