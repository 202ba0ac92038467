//! Core types for policy-ledger.
//!
//! This crate provides the table schema descriptor, the codec converting
//! policy rules to and from storage rows, and the [`PolicyModel`] seam the
//! adapter loads rules into.

pub mod codec;
pub mod error;
pub mod model;
pub mod schema;

pub use codec::{PolicyRow, decode, encode};
pub use error::{CodecError, Result, SchemaError};
pub use model::{MemoryModel, PERSISTED_SECTIONS, PolicyModel, load_policy_line};
pub use schema::{DEFAULT_COLUMNS, DEFAULT_TABLE_NAME, IDENTITY_COLUMN, TableSchema};
