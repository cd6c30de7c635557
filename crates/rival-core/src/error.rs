//! Error types for rival

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input (missing category, non-positive amount, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The AI collaborator could not be reached or did not answer in time
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// The AI collaborator answered, but not with the expected structure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from the persistent cache store
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Pool(_) | Error::Encryption(_) | Error::Json(_)
        )
    }

    /// Whether the search pipeline may fail open on this error
    ///
    /// Only collaborator failures degrade to an empty suggestion; validation
    /// and store failures are handled elsewhere.
    pub fn is_search_failure(&self) -> bool {
        matches!(
            self,
            Error::SearchUnavailable(_) | Error::MalformedResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
