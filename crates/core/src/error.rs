//! Unified error types for overcast.
//!
//! One enum covers every failure class in the system; the propagation
//! policy (what aborts install, what falls back, what is swallowed with a
//! log) lives with the callers, not here.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error type for the overcast cache layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Manifest could not be fetched (transport failure or non-2xx status).
    #[error("MANIFEST_FETCH: {0}")]
    ManifestFetch(String),

    /// Manifest body is not a flat JSON object of string values.
    #[error("MANIFEST_PARSE: {0}")]
    ManifestParse(String),

    /// A URL in a precache batch failed; the batch is void as a whole.
    #[error("PRECACHE_BATCH: {0}")]
    PrecacheBatch(String),

    /// Network-level fetch failure (DNS, connect, timeout, body read).
    #[error("NETWORK_FETCH: {0}")]
    NetworkFetch(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Cache(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// The strategy result was unusable and no fallback is configured.
    #[error("NO_FALLBACK: {0}")]
    NoFallback(String),

    /// Control envelope carried an action nobody recognizes.
    #[error("UNKNOWN_ACTION: {0}")]
    UnknownAction(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The lifecycle has not reached the state the operation requires.
    #[error("NOT_READY: {0}")]
    NotReady(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Cache(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Cache(tokio_rusqlite::Error::Close(c)),
            _ => Error::Cache(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Cache(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Cache(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::Cache(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::ManifestFetch(msg) => (-32020, msg.clone()),
            Error::ManifestParse(msg) => (-32021, msg.clone()),
            Error::PrecacheBatch(msg) => (-32022, msg.clone()),
            Error::NetworkFetch(msg) => (-32023, msg.clone()),
            Error::NoFallback(msg) => (-32024, msg.clone()),
            Error::UnknownAction(msg) => (-32025, msg.clone()),
            Error::NotReady(msg) => (-32026, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
