//! Error types for the app layer.
//!
//! None of these reach the user: storage failures are logged and the session
//! carries on in memory, feedback failures are replaced by a fixed message.

use thiserror::Error;

/// Failure reading or writing the blob store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("schema migration failed: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("could not encode or decode '{key}': {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure fetching a run summary from the feedback service.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {status}")]
    Status { status: u16 },

    #[error("response contained no text")]
    EmptyResponse,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
