//! Table schema descriptor for policy storage.
//!
//! A schema names the backing table and its ordered columns. Column 0 holds
//! the policy type tag (`p`, `g`, `g2`, ...); the remaining columns hold the
//! rule fields in order. The identity key column `id` is implicit and never
//! part of the descriptor.

use crate::error::SchemaError;
use rootcause::Report;
use serde::Deserialize;

/// Name of the implicit auto-increment identity column.
pub const IDENTITY_COLUMN: &str = "id";

/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "casbin_rule";

/// Default column layout: a type column followed by six field columns.
pub const DEFAULT_COLUMNS: [&str; 7] = ["ptype", "v0", "v1", "v2", "v3", "v4", "v5"];

/// Table and column layout of a policy store.
///
/// The descriptor is validated once at construction and is immutable
/// afterwards. It must match the real table; a mismatch surfaces as backend
/// errors at query time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTableSchema")]
pub struct TableSchema {
    table_name: String,
    columns: Vec<String>,
}

#[derive(Deserialize)]
struct RawTableSchema {
    #[serde(default = "default_table_name")]
    name: String,
    #[serde(default = "default_columns")]
    columns: Vec<String>,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(ToString::to_string).collect()
}

impl TryFrom<RawTableSchema> for TableSchema {
    type Error = SchemaError;

    fn try_from(raw: RawTableSchema) -> Result<Self, Self::Error> {
        Self::validate(&raw.name, &raw.columns)?;
        Ok(Self {
            table_name: raw.name,
            columns: raw.columns,
        })
    }
}

impl TableSchema {
    /// Creates a schema descriptor after validating every name.
    pub fn new<I, S>(table_name: impl Into<String>, columns: I) -> Result<Self, Report<SchemaError>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table_name = table_name.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self::validate(&table_name, &columns)?;
        Ok(Self {
            table_name,
            columns,
        })
    }

    /// Creates the default layout (`ptype`, `v0`..`v5`) for the given table.
    pub fn with_default_columns(
        table_name: impl Into<String>,
    ) -> Result<Self, Report<SchemaError>> {
        Self::new(table_name, DEFAULT_COLUMNS)
    }

    fn validate(table_name: &str, columns: &[String]) -> Result<(), SchemaError> {
        if !is_identifier(table_name) {
            return Err(SchemaError::InvalidIdentifier {
                name: table_name.to_string(),
            });
        }
        if columns.len() < 2 {
            return Err(SchemaError::TooFewColumns {
                count: columns.len(),
            });
        }
        for (i, column) in columns.iter().enumerate() {
            if !is_identifier(column) {
                return Err(SchemaError::InvalidIdentifier {
                    name: column.clone(),
                });
            }
            if column.eq_ignore_ascii_case(IDENTITY_COLUMN) {
                return Err(SchemaError::ReservedColumn {
                    name: column.clone(),
                });
            }
            if columns[..i].iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(SchemaError::DuplicateColumn {
                    name: column.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns every configured column, type column first.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the type discriminator column.
    #[must_use]
    pub fn type_column(&self) -> &str {
        &self.columns[0]
    }

    /// Returns the rule field columns in positional order.
    #[must_use]
    pub fn field_columns(&self) -> &[String] {
        &self.columns[1..]
    }

    /// Returns how many rule fields a row can hold.
    #[must_use]
    pub fn field_capacity(&self) -> usize {
        self.columns.len() - 1
    }

    /// Returns the column holding rule field `index`, if the table has one.
    #[must_use]
    pub fn field_column(&self, index: usize) -> Option<&str> {
        self.columns.get(index + 1).map(String::as_str)
    }

    /// Returns true if `name` is one of the configured columns.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Returns the rule field position of `column`, if it is a field column.
    #[must_use]
    pub fn field_position(&self, column: &str) -> Option<usize> {
        self.field_columns().iter().position(|c| c == column)
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            columns: default_columns(),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_layout() {
        let schema = TableSchema::default();
        assert_eq!(schema.table_name(), "casbin_rule");
        assert_eq!(schema.type_column(), "ptype");
        assert_eq!(schema.field_capacity(), 6);
        assert_eq!(schema.field_column(0), Some("v0"));
        assert_eq!(schema.field_column(5), Some("v5"));
        assert_eq!(schema.field_column(6), None);
    }

    #[test]
    fn custom_columns_map_positionally() {
        let schema =
            TableSchema::new("rule", ["type", "role_id", "href", "method"]).expect("valid schema");
        assert_eq!(schema.type_column(), "type");
        assert_eq!(schema.field_columns(), ["role_id", "href", "method"]);
        assert_eq!(schema.field_position("href"), Some(1));
        assert_eq!(schema.field_position("type"), None);
        assert!(schema.has_column("method"));
    }

    #[test]
    fn rejects_non_identifier_names() {
        assert!(TableSchema::new("rules; drop table x", ["ptype", "v0"]).is_err());
        assert!(TableSchema::new("rules", ["ptype", "v0\""]).is_err());
        assert!(TableSchema::new("rules", ["ptype", "0v"]).is_err());
    }

    #[test]
    fn rejects_degenerate_layouts() {
        assert!(TableSchema::new("rules", ["ptype"]).is_err());
        assert!(TableSchema::new("rules", ["ptype", "v0", "V0"]).is_err());
        assert!(TableSchema::new("rules", ["ptype", "id"]).is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        #[derive(Deserialize)]
        struct Wrapper {
            table: TableSchema,
        }

        let wrapper: Wrapper =
            serde_json::from_str(r#"{"table": {"name": "acl"}}"#).expect("valid json");
        assert_eq!(wrapper.table.table_name(), "acl");
        assert_eq!(wrapper.table.field_capacity(), 6);

        let bad: Result<Wrapper, _> =
            serde_json::from_str(r#"{"table": {"name": "acl", "columns": ["ptype"]}}"#);
        assert!(bad.is_err());
    }
}
