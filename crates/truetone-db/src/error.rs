//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Stored value could not be decoded into a domain value
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Result alias for repository operations
pub type DbResult<T> = Result<T, DbError>;
