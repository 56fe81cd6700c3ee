use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// An insert violated a uniqueness rule.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Sqlite(other),
        }
    }
}

impl StoreError {
    /// Map a constraint violation from `err` to [`StoreError::Duplicate`]
    /// with the given description, passing other errors through.
    ///
    /// Concurrent duplicate inserts are not serialized above the store; the
    /// unique constraint is the arbiter and losers surface here.
    pub fn on_conflict(err: rusqlite::Error, what: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(inner, _) = &err {
            if inner.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::Duplicate(what.to_string());
            }
        }
        err.into()
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
