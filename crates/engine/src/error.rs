//! Errors raised by document engine clients

use thiserror::Error;

/// Result type alias for engine calls
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure talking to the document engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The request never got a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the client timeout
    #[error("request timed out")]
    Timeout,

    /// The engine answered with an error status
    #[error("engine returned {status}: {kind}: {reason}")]
    Status {
        status: u16,
        kind: String,
        reason: String,
    },

    /// An index, alias or template with this name already exists
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The addressed index or point in time does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded
    #[error("invalid response: {0}")]
    Decode(String),

    /// The client could not be built from its configuration
    #[error("invalid engine configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// HTTP status the engine reported, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Status { status, .. } => Some(*status),
            EngineError::AlreadyExists(_) => Some(400),
            EngineError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Convert into a backend error, naming the failed operation
    pub fn context(self, context: impl Into<String>) -> siftlog_core::Error {
        siftlog_core::Error::Upstream {
            context: context.into(),
            status: self.status(),
            message: self.to_string(),
        }
    }
}

impl From<EngineError> for siftlog_core::Error {
    fn from(e: EngineError) -> Self {
        e.context("document engine request failed")
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EngineError::Timeout
        } else if e.is_decode() {
            EngineError::Decode(e.to_string())
        } else {
            EngineError::Transport(e.to_string())
        }
    }
}
