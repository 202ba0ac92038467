//! Policy persistence adapter for policy-ledger.
//!
//! [`SqlAdapter`] keeps an in-memory authorization model in sync with a SQL
//! table: full and filtered loads, full saves, and single, batch, and
//! filtered mutations. Batch removals and updates are transactional.
//!
//! # Example
//!
//! ```ignore
//! use policy_ledger_adapter::{Adapter, SqlAdapter};
//! use policy_ledger_core::{MemoryModel, TableSchema};
//! use policy_ledger_store::{AnyPoolOptions, RuleStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RuleStore::connect(
//!     "postgres://localhost/authz",
//!     AnyPoolOptions::new().max_connections(5),
//!     TableSchema::default(),
//! )
//! .await?;
//! let adapter = SqlAdapter::new(store).await?;
//!
//! adapter
//!     .add_policy("p", "p", vec!["alice".into(), "data1".into(), "read".into()])
//!     .await?;
//!
//! let mut model = MemoryModel::new();
//! adapter.load_policy(&mut model).await?;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod contract;
mod error;
mod filter;
mod interceptor;

pub use adapter::{MAX_FILTER_FIELDS, SqlAdapter};
pub use contract::{Adapter, BatchAdapter, FilteredAdapter, UpdatableAdapter};
pub use error::AdapterError;
pub use filter::{Filter, QueryPredicate};
pub use interceptor::{FieldScope, Operation, RuleInterceptor};
