//! Error types for statement execution.
//!
//! Errors are categorized so callers can tell a transport failure from a
//! statement the endpoint refused. Nothing in this crate retries; the
//! category is informational for whoever drives the next reconcile pass.

use std::fmt;

/// Result type alias for statement execution.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of statement execution errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The endpoint could not be reached or answered with a server error.
    Network,
    /// The endpoint executed nothing because the statement was refused.
    Statement,
    /// The endpoint answered with something that is not a Data API payload.
    Format,
    /// The caller supplied a value that cannot be placed into SQL.
    Input,
}

impl ErrorCategory {
    /// Whether a later pass could succeed without changing the input.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Endpoint unreachable",
            Self::Statement => "Statement rejected",
            Self::Format => "Invalid endpoint response",
            Self::Input => "Invalid input",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the endpoint URL and that the cluster is running",
            Self::Statement => "Inspect the statement and the object it targets",
            Self::Format => "Verify the endpoint speaks the RDS Data API protocol",
            Self::Input => "Fix the offending name in the manifest",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while executing a statement.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport failed or the endpoint returned a server error.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The endpoint refused the statement (syntax error, missing object,
    /// duplicate object, insufficient privilege, ...).
    #[error("statement rejected: {message}")]
    Rejected {
        /// Message reported by the endpoint.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Identifier cannot be quoted.
    #[error("invalid identifier {identifier:?}: {reason}")]
    InvalidIdentifier {
        /// The offending identifier.
        identifier: String,
        /// Why it was refused.
        reason: &'static str,
    },
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create a rejected-statement error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { .. } => ErrorCategory::Network,
            Error::Rejected { .. } => ErrorCategory::Statement,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::InvalidIdentifier { .. } => ErrorCategory::Input,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
