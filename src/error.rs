//! Request-level error taxonomy.
//!
//! Handlers return [`AppError`]; the server turns it into an HTTP status
//! and a flat `{"error": "<message>"}` body. Only [`AppError::InvalidInput`]
//! exposes its message to the client. Everything else is logged and
//! answered with the endpoint's generic 500 message.
//!
//! Completion-API failures never appear here: the analysis generator absorbs
//! them into fallback content (see [`crate::gateway::complete_or_fallback`]).

use thiserror::Error;

use crate::extract::ExtractError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing request fields (400).
    #[error("{0}")]
    InvalidInput(String),

    /// A content source could not be read during ingestion (500).
    #[error(transparent)]
    ExtractionFailed(#[from] ExtractError),

    /// The key-value store rejected a read or write (500).
    #[error("store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    /// Anything else that escaped a handler (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::InvalidInput(_))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::StoreUnavailable(err)
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
