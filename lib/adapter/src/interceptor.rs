//! Interceptors scoping and authorizing rule access.
//!
//! The adapter calls every registered interceptor, in registration order,
//! before it touches storage. Scoping adds predicates to the queries the
//! adapter builds; authorization may refuse a write outright. Interceptors
//! carry whatever caller identity they need, so the storage layer never sees
//! one.

use crate::error::AdapterError;
use policy_ledger_core::TableSchema;
use policy_ledger_store::RuleQuery;
use rootcause::Report;
use std::fmt;

/// Kinds of rule access an interceptor is consulted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Loading rules into a model.
    Read,
    /// Adding rules.
    Insert,
    /// Rewriting rules.
    Update,
    /// Removing rules.
    Delete,
}

impl Operation {
    /// Returns the operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hook around every storage access of the adapter.
pub trait RuleInterceptor: Send + Sync {
    /// Adds conditions to a read, update, or delete query.
    fn scope(&self, operation: Operation, query: &mut RuleQuery) {
        let _ = (operation, query);
    }

    /// Checks that `rule` of type `ptype` may be written.
    ///
    /// For deletes, empty fields in `rule` are wildcards.
    fn authorize(
        &self,
        schema: &TableSchema,
        operation: Operation,
        ptype: &str,
        rule: &[String],
    ) -> Result<(), Report<AdapterError>> {
        let _ = (schema, operation, ptype, rule);
        Ok(())
    }
}

/// Confines the adapter to rules whose `column` holds `value`.
///
/// Typical use is a tenant or domain field: reads and deletes only see the
/// caller's rows, and writes of rules for any other value are refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldScope {
    column: String,
    value: String,
}

impl FieldScope {
    /// Creates a scope on `column` = `value`.
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    fn deny(&self, operation: Operation, ptype: &str, reason: String) -> Report<AdapterError> {
        AdapterError::Unauthorized {
            operation,
            ptype: ptype.to_string(),
            reason,
        }
        .into()
    }
}

impl RuleInterceptor for FieldScope {
    fn scope(&self, _operation: Operation, query: &mut RuleQuery) {
        query.where_eq(self.column.clone(), self.value.clone());
    }

    fn authorize(
        &self,
        schema: &TableSchema,
        operation: Operation,
        ptype: &str,
        rule: &[String],
    ) -> Result<(), Report<AdapterError>> {
        let Some(position) = schema.field_position(&self.column) else {
            return Err(self.deny(
                operation,
                ptype,
                format!("scope column '{}' is not a rule field", self.column),
            ));
        };

        match rule.get(position).map(String::as_str) {
            Some(value) if value == self.value => Ok(()),
            Some("") | None if operation == Operation::Delete => Ok(()),
            Some(value) => Err(self.deny(
                operation,
                ptype,
                format!("{} '{value}' is outside scope '{}'", self.column, self.value),
            )),
            None => Err(self.deny(
                operation,
                ptype,
                format!("rule does not set {}", self.column),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(fields: &[&str]) -> Vec<String> {
        fields.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn field_scope_allows_matching_rules() {
        let schema = TableSchema::default();
        let scope = FieldScope::new("v1", "tenant1");
        assert!(
            scope
                .authorize(&schema, Operation::Insert, "p", &rule(&["alice", "tenant1", "read"]))
                .is_ok()
        );
    }

    #[test]
    fn field_scope_refuses_other_values() {
        let schema = TableSchema::default();
        let scope = FieldScope::new("v1", "tenant1");
        let err = scope
            .authorize(&schema, Operation::Update, "p", &rule(&["alice", "tenant2", "read"]))
            .unwrap_err();
        assert!(err.to_string().contains("outside scope"));
    }

    #[test]
    fn field_scope_treats_unset_as_wildcard_for_deletes_only() {
        let schema = TableSchema::default();
        let scope = FieldScope::new("v1", "tenant1");
        assert!(
            scope
                .authorize(&schema, Operation::Delete, "p", &rule(&["alice"]))
                .is_ok()
        );
        assert!(
            scope
                .authorize(&schema, Operation::Insert, "p", &rule(&["alice"]))
                .is_err()
        );
    }

    #[test]
    fn field_scope_on_type_column_refuses() {
        let schema = TableSchema::default();
        let scope = FieldScope::new("ptype", "p");
        assert!(
            scope
                .authorize(&schema, Operation::Insert, "p", &rule(&["alice"]))
                .is_err()
        );
    }
}
