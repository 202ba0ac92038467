//! Rule store error types.

use std::fmt;

/// Errors from the rule store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database URL names a backend the store cannot talk to.
    UnsupportedBackend {
        /// The URL scheme that was given.
        scheme: String,
    },
    /// Failed to connect to the database.
    ConnectFailed {
        /// Error details.
        details: String,
    },
    /// A statement failed on the backend.
    QueryFailed {
        /// The store operation that issued the statement.
        operation: &'static str,
        /// The backend's error message.
        details: String,
    },
    /// A condition or assignment named a column the table does not have.
    UnknownColumn {
        /// The column name.
        column: String,
    },
    /// A positional condition addressed a field the table does not have.
    FieldOutOfRange {
        /// The field position.
        index: usize,
        /// Number of field columns in the table.
        capacity: usize,
    },
}

impl StoreError {
    pub(crate) fn query_failed(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| Self::QueryFailed {
            operation,
            details: e.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedBackend { scheme } => {
                write!(f, "unsupported database backend '{}'", scheme)
            }
            Self::ConnectFailed { details } => {
                write!(f, "failed to connect to database: {}", details)
            }
            Self::QueryFailed { operation, details } => {
                write!(f, "{} failed: {}", operation, details)
            }
            Self::UnknownColumn { column } => write!(f, "unknown column '{}'", column),
            Self::FieldOutOfRange { index, capacity } => {
                write!(
                    f,
                    "field position {} is out of range for a table with {} fields",
                    index, capacity
                )
            }
        }
    }
}

impl std::error::Error for StoreError {}
