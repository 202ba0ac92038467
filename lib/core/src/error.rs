//! Error handling foundation for policy-ledger.
//!
//! This module provides the `Result` type alias using rootcause, plus the
//! error types raised by the schema descriptor and the row codec. The store
//! and adapter crates define their own error types for their layers.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Errors from validating a table schema descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A table or column name is not a plain SQL identifier.
    InvalidIdentifier { name: String },
    /// The schema needs a type column and at least one field column.
    TooFewColumns { count: usize },
    /// The same column name appears twice.
    DuplicateColumn { name: String },
    /// The column name is reserved for the identity key.
    ReservedColumn { name: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIdentifier { name } => {
                write!(f, "invalid identifier '{}'", name)
            }
            Self::TooFewColumns { count } => {
                write!(
                    f,
                    "table needs a type column and at least one field column, got {} columns",
                    count
                )
            }
            Self::DuplicateColumn { name } => write!(f, "duplicate column '{}'", name),
            Self::ReservedColumn { name } => {
                write!(f, "column name '{}' is reserved for the identity key", name)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Errors from encoding policy rules into rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The rule has more fields than the table has field columns.
    TooManyFields {
        ptype: String,
        fields: usize,
        capacity: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyFields {
                ptype,
                fields,
                capacity,
            } => write!(
                f,
                "rule of type '{}' has {} fields but the table holds at most {}",
                ptype, fields, capacity
            ),
        }
    }
}

impl std::error::Error for CodecError {}
