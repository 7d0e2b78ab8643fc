//! Error types for tally-core

use thiserror::Error;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API answered with a non-success status
    #[error("Remote API error: {0}")]
    Api(String),

    /// Remote push endpoint did not accept a page
    #[error("Push for {entity} rejected (request {request_id}): {message}")]
    Rejected {
        entity: String,
        request_id: String,
        message: String,
    },

    /// No endpoint is configured for an entity type
    #[error("No push endpoint configured for entity: {0}")]
    UnknownEndpoint(String),

    /// Another push cycle for the same entity is running
    #[error("Push already in progress for entity: {0}")]
    SyncInProgress(String),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Image upload failed or produced no remote URL
    #[error("Upload failed for {local_uri}: {reason}")]
    Upload { local_uri: String, reason: String },
}
