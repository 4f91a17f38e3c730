use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// The caller handed us something the schema would reject.
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The worker running the query went away before answering.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
