//! Filters for partial policy loading.

use crate::error::AdapterError;
use policy_ledger_core::TableSchema;
use policy_ledger_store::RuleQuery;
use rootcause::Report;
use std::fmt;

/// A query modifier supplied by the caller.
pub type QueryPredicate = Box<dyn Fn(&mut RuleQuery) + Send + Sync>;

/// Selects which stored rules a filtered load brings into the model.
pub enum Filter {
    /// A raw SQL predicate, inserted into the WHERE clause as is.
    Raw(String),
    /// Column/value pairs that must all match.
    Equality(Vec<(String, String)>),
    /// A caller-supplied function adding conditions to the query.
    Predicate(QueryPredicate),
}

impl Filter {
    /// Creates a raw SQL filter.
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self::Raw(fragment.into())
    }

    /// Creates an equality filter from column/value pairs.
    pub fn equality<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Equality(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Creates a filter from a query-modifying function.
    pub fn predicate(f: impl Fn(&mut RuleQuery) + Send + Sync + 'static) -> Self {
        Self::Predicate(Box::new(f))
    }

    /// Parses a filter from JSON: a string is a raw predicate and an object
    /// of strings is an equality filter.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, Report<AdapterError>> {
        match value {
            serde_json::Value::String(fragment) => Ok(Self::raw(fragment.clone())),
            serde_json::Value::Object(map) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (column, value) in map {
                    let serde_json::Value::String(value) = value else {
                        return Err(AdapterError::InvalidFilterType {
                            details: format!("value for column '{column}' is not a string"),
                        }
                        .into());
                    };
                    pairs.push((column.clone(), value.clone()));
                }
                Ok(Self::Equality(pairs))
            }
            other => Err(AdapterError::InvalidFilterType {
                details: format!("expected a string or an object, got {other}"),
            }
            .into()),
        }
    }

    /// Adds this filter's conditions to `query`.
    pub(crate) fn apply(
        self,
        schema: &TableSchema,
        query: &mut RuleQuery,
    ) -> Result<(), Report<AdapterError>> {
        match self {
            Self::Raw(fragment) => {
                if fragment.trim().is_empty() {
                    return Err(AdapterError::InvalidFilterType {
                        details: "raw filter is empty".to_string(),
                    }
                    .into());
                }
                query.where_raw(fragment);
            }
            Self::Equality(pairs) => {
                for (column, value) in pairs {
                    if !schema.has_column(&column) {
                        return Err(AdapterError::InvalidFilterType {
                            details: format!("unknown column '{column}'"),
                        }
                        .into());
                    }
                    query.where_eq(column, value);
                }
            }
            Self::Predicate(f) => f(query),
        }
        Ok(())
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(fragment) => f.debug_tuple("Raw").field(fragment).finish(),
            Self::Equality(pairs) => f.debug_tuple("Equality").field(pairs).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
