//! Error types for the log-store backend
//!
//! Every public operation returns [`Result`]. Errors fall into three
//! categories, exposed through [`ErrorKind`]:
//!
//! | Kind         | Status | Raised for                                           |
//! |--------------|--------|------------------------------------------------------|
//! | `Validation` | 400    | bad tenancy, selector, cursor, page size, subtype     |
//! | `Forbidden`  | 403    | caller holds no usable grant                          |
//! | `Upstream`   | 5xx    | document engine failures, timeouts, deadlines         |
//!
//! Partial bulk failure is NOT an error: it is reported through
//! [`BulkResponse`](crate::bulk::BulkResponse).

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-side problem; the request must be fixed before retrying
    Validation,
    /// The caller is not allowed to see any of the requested data
    Forbidden,
    /// The document engine failed or did not answer in time
    Upstream,
}

/// Structured reason for a selector rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorErrorKind {
    /// The selector text does not follow the grammar
    Syntax,
    /// The key is not searchable for this log type
    InvalidKey,
    /// The value does not match the key's type
    InvalidValue,
    /// The selector is longer than the configured limit
    TooLong,
}

/// Error types for the log-store backend
#[derive(Debug, Error)]
pub enum Error {
    /// The tenancy context failed validation
    #[error("invalid cluster info: {reason}")]
    InvalidTenancy {
        /// What was wrong
        reason: String,
    },

    /// The selector could not be parsed or validated
    #[error("Invalid selector ({selector}) in request: {reason}")]
    InvalidSelector {
        /// The selector as supplied
        selector: String,
        /// Structured reason
        kind: SelectorErrorKind,
        /// Human readable reason
        reason: String,
    },

    /// Any other malformed request parameter
    #[error("{0}")]
    InvalidRequest(String),

    /// The caller holds no grant that allows reading this data
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The document engine rejected or failed the request
    #[error("{context}: {message}")]
    Upstream {
        /// Operation that failed
        context: String,
        /// Engine or transport message
        message: String,
        /// HTTP status reported by the engine, if any
        status: Option<u16>,
    },

    /// The call did not complete within the caller's timeout
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    /// A document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidRequest`]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Error::InvalidRequest(msg.into())
    }

    /// Shorthand for [`Error::InvalidTenancy`]
    pub fn invalid_tenancy(reason: impl Into<String>) -> Self {
        Error::InvalidTenancy {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::InvalidSelector`]
    pub fn invalid_selector(
        selector: impl Into<String>,
        kind: SelectorErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidSelector {
            selector: selector.into(),
            kind,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::Upstream`] without a status code
    pub fn upstream(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Upstream {
            context: context.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidTenancy { .. }
            | Error::InvalidSelector { .. }
            | Error::InvalidRequest(_) => ErrorKind::Validation,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Upstream { .. } | Error::DeadlineExceeded(_) | Error::Serialization(_) => {
                ErrorKind::Upstream
            }
        }
    }

    /// HTTP status a surface layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Error::DeadlineExceeded(_) => 504,
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::Forbidden => 403,
                ErrorKind::Upstream => 500,
            },
        }
    }

    /// True for client errors
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
