//! # courier-store
//!
//! Message history for the relay, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`. It assigns every message its id and timestamp,
//! which is what lets both ends of a conversation deduplicate the records
//! the relay pushes to them.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
