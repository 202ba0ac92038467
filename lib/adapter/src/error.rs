//! Adapter error types.

use crate::interceptor::Operation;
use policy_ledger_store::StoreError;
use rootcause::Report;
use std::fmt;

/// Errors surfaced by the policy adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The filter passed to a filtered load has an unusable shape.
    InvalidFilterType {
        /// Error details.
        details: String,
    },
    /// The backend rejected a statement or could not be reached.
    Backend {
        /// The backend's error, unchanged.
        details: String,
    },
    /// Rule lists or rule widths do not fit the operation or the table.
    ShapeMismatch {
        /// Error details.
        details: String,
    },
    /// An interceptor refused the operation.
    Unauthorized {
        /// The refused operation.
        operation: Operation,
        /// Policy type of the rule.
        ptype: String,
        /// Why the interceptor refused.
        reason: String,
    },
}

impl AdapterError {
    pub(crate) fn backend(report: Report<StoreError>) -> Self {
        Self::Backend {
            details: report.to_string(),
        }
    }

    pub(crate) fn sql(err: sqlx::Error) -> Self {
        Self::Backend {
            details: err.to_string(),
        }
    }

    pub(crate) fn shape(details: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            details: details.into(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFilterType { details } => write!(f, "invalid filter type: {}", details),
            Self::Backend { details } => write!(f, "policy storage failed: {}", details),
            Self::ShapeMismatch { details } => write!(f, "policy shape mismatch: {}", details),
            Self::Unauthorized {
                operation,
                ptype,
                reason,
            } => write!(
                f,
                "{} of '{}' rule not authorized: {}",
                operation, ptype, reason
            ),
        }
    }
}

impl std::error::Error for AdapterError {}
