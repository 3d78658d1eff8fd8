use thiserror::Error;

/// Errors that can occur within the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `update` on a path that holds no document.
    #[error("Document not found: {path}")]
    NotFound { path: String },

    /// `create` on a path that already holds a document.
    #[error("Document already exists: {path}")]
    AlreadyExists { path: String },

    /// Path is not a well-formed `collection/doc[/collection/doc...]` string.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Filter or order-by field is not a plain dotted identifier.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Backend temporarily unreachable (network, throttling).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
