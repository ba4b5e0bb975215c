//! Database error types for the audit bootstrap.

use thiserror::Error;

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// The principal is already present in the user catalog.
    #[error("principal '{user}' already exists on database '{db}'")]
    PrincipalExists { user: String, db: String },

    /// An index key specification could not be built or read back.
    #[error("invalid index specification: {0}")]
    InvalidIndex(String),

    /// A document returned by the store did not have the expected shape.
    #[error("unexpected document shape: {0}")]
    Decode(String),

    /// Underlying MongoDB driver error.
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
