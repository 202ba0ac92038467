//! SQL storage for policy-ledger rules.
//!
//! This crate maps policy rows onto one relational table through the sqlx
//! `Any` driver, so the same store runs on PostgreSQL, SQLite, and MySQL.
//! Every operation takes the connection to run on, which lets the adapter
//! group several operations into one transaction.

mod dialect;
mod error;
mod query;
mod store;

pub use dialect::Dialect;
pub use error::StoreError;
pub use query::{RowValues, RuleQuery};
pub use store::RuleStore;

pub use sqlx::AnyConnection;
pub use sqlx::any::AnyPoolOptions;
