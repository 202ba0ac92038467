//! CLI error types.

use std::fmt;

/// Failures surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// A policy file could not be read.
    PolicyFile { path: String, details: String },
    /// A command argument was rejected before reaching storage.
    InvalidArgument { details: String },
    /// The adapter or store refused the operation.
    Operation { details: String },
}

impl CliError {
    pub fn operation(err: impl fmt::Display) -> Self {
        Self::Operation {
            details: err.to_string(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {}", details),
            Self::PolicyFile { path, details } => {
                write!(f, "cannot read policy file {}: {}", path, details)
            }
            Self::InvalidArgument { details } => write!(f, "invalid argument: {}", details),
            Self::Operation { details } => write!(f, "{}", details),
        }
    }
}

impl std::error::Error for CliError {}
