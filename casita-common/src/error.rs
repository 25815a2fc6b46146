//! Common error types for Casita

use thiserror::Error;

/// Common result type for Casita operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Casita services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input, malformed table, or bad request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Two logical table names normalize to the same stored name
    #[error("Table name collision: '{first}' and '{second}' both normalize to '{normalized}'")]
    NameCollision {
        first: String,
        second: String,
        normalized: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
