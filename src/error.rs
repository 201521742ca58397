//! Failure taxonomy for reconciliation.
//!
//! A zero-row read is deliberately absent from this list: it means the
//! object was deleted out of band and is reported through
//! [`ReadOutcome::NotFound`](crate::resource::ReadOutcome), not as an error.

use dataapi::ErrorCategory;
use std::fmt;

/// Which branch of the taxonomy an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A remote call failed; nothing was applied by that call
    Connectivity,
    /// Input was refused before any remote call
    Validation,
    /// A later statement of a multi-statement operation failed
    PartialApply,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Validation => write!(f, "validation"),
            Self::PartialApply => write!(f, "partial apply"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("statement failed: {statement}")]
    Connectivity {
        statement: String,
        #[source]
        source: dataapi::Error,
    },

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("statement failed after {completed} earlier statement(s) took effect: {statement}")]
    PartialApply {
        completed: usize,
        statement: String,
        #[source]
        source: dataapi::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

impl ReconcileError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Connectivity { .. } => FaultKind::Connectivity,
            Self::Validation { .. } => FaultKind::Validation,
            Self::PartialApply { .. } => FaultKind::PartialApply,
        }
    }

    /// Category of the underlying endpoint failure, if there was a remote call
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Connectivity { source, .. } | Self::PartialApply { source, .. } => {
                Some(source.category())
            }
            Self::Validation { .. } => None,
        }
    }

    /// Re-tag a failed statement as the later step of an operation whose
    /// first `completed` statements already succeeded.
    ///
    /// Validation errors and errors with nothing completed pass through.
    pub fn after(self, completed: usize) -> Self {
        match self {
            Self::Connectivity { statement, source } if completed > 0 => Self::PartialApply {
                completed,
                statement,
                source,
            },
            other => other,
        }
    }
}

/// Quote an identifier, reporting refusal as a validation error on `field`
pub fn ident(field: &'static str, name: &str) -> Result<String> {
    dataapi::quote_ident(name).map_err(|e| match e {
        dataapi::Error::InvalidIdentifier { reason, .. } => {
            ReconcileError::validation(field, format!("{name:?} {reason}"))
        }
        other => ReconcileError::validation(field, other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected() -> ReconcileError {
        ReconcileError::Connectivity {
            statement: "GRANT readers TO app".into(),
            source: dataapi::Error::rejected("role \"readers\" does not exist"),
        }
    }

    #[test]
    fn test_kind() {
        assert_eq!(rejected().kind(), FaultKind::Connectivity);
        assert_eq!(
            ReconcileError::validation("name", "must not be empty").kind(),
            FaultKind::Validation
        );
    }

    #[test]
    fn test_after_promotes_to_partial_apply() {
        let err = rejected().after(1);
        assert_eq!(err.kind(), FaultKind::PartialApply);
        assert!(err.to_string().contains("GRANT readers TO app"));

        assert_eq!(rejected().after(0).kind(), FaultKind::Connectivity);
        assert_eq!(
            ReconcileError::validation("owner", "x").after(2).kind(),
            FaultKind::Validation
        );
    }

    #[test]
    fn test_category_of_network_failure() {
        let err = ReconcileError::Connectivity {
            statement: "SELECT 1".into(),
            source: dataapi::Error::http("connection refused", None),
        };
        assert!(err.category().is_some_and(|c| c.is_transient()));
        assert!(ReconcileError::validation("name", "x").category().is_none());
    }

    #[test]
    fn test_ident_maps_to_validation() {
        assert_eq!(ident("name", "app").unwrap(), "app");
        let err = ident("name", "").unwrap_err();
        assert_eq!(err.kind(), FaultKind::Validation);
        assert!(err.to_string().starts_with("invalid name"));
    }
}
