//! Condition builder over the rule table.
//!
//! A [`RuleQuery`] collects a conjunction of conditions and renders them into
//! parameterized SQL for one of the terminal operations. Column names are
//! checked against the table schema when the statement is rendered.

use crate::dialect::Dialect;
use crate::error::StoreError;
use policy_ledger_core::{IDENTITY_COLUMN, TableSchema};
use rootcause::Report;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::{Any, AnyConnection, Row};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Stored values of one row: type column first, then every field column.
pub type RowValues = Vec<Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Eq { column: String, value: String },
    Field { index: usize, value: String },
    Id(i64),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindValue {
    Text(Option<String>),
    Int(i64),
}

/// A SQL statement under construction with its bind values.
#[derive(Debug)]
pub(crate) struct Statement {
    dialect: Dialect,
    pub(crate) sql: String,
    pub(crate) binds: Vec<BindValue>,
}

impl Statement {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            binds: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub(crate) fn push_ident(&mut self, ident: &str) -> &mut Self {
        let quoted = self.dialect.quote(ident);
        self.sql.push_str(&quoted);
        self
    }

    pub(crate) fn push_bind(&mut self, value: BindValue) -> &mut Self {
        self.binds.push(value);
        let placeholder = self.dialect.placeholder(self.binds.len());
        self.sql.push_str(&placeholder);
        self
    }

    fn bound(&self) -> sqlx::query::Query<'_, Any, AnyArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for value in &self.binds {
            query = match value {
                BindValue::Text(text) => query.bind(text.clone()),
                BindValue::Int(int) => query.bind(*int),
            };
        }
        query
    }

    pub(crate) async fn execute(
        &self,
        conn: &mut AnyConnection,
        operation: &'static str,
    ) -> Result<u64, Report<StoreError>> {
        let result = self
            .bound()
            .execute(&mut *conn)
            .await
            .map_err(StoreError::query_failed(operation))?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn fetch_all(
        &self,
        conn: &mut AnyConnection,
        operation: &'static str,
    ) -> Result<Vec<AnyRow>, Report<StoreError>> {
        Ok(self
            .bound()
            .fetch_all(&mut *conn)
            .await
            .map_err(StoreError::query_failed(operation))?)
    }

    pub(crate) async fn fetch_optional(
        &self,
        conn: &mut AnyConnection,
        operation: &'static str,
    ) -> Result<Option<AnyRow>, Report<StoreError>> {
        Ok(self
            .bound()
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::query_failed(operation))?)
    }
}

/// A conjunction of conditions over one rule table.
///
/// Equality against an empty value matches both NULL and the empty string,
/// since both mean "unset".
#[derive(Debug, Clone)]
pub struct RuleQuery {
    schema: Arc<TableSchema>,
    dialect: Dialect,
    conditions: Vec<Condition>,
}

impl RuleQuery {
    pub(crate) fn new(schema: Arc<TableSchema>, dialect: Dialect) -> Self {
        Self {
            schema,
            dialect,
            conditions: Vec::new(),
        }
    }

    /// Returns the schema of the queried table.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Requires `column` to equal `value`.
    pub fn where_eq(&mut self, column: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.conditions.push(Condition::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Requires the type column to equal `ptype`.
    pub fn where_type(&mut self, ptype: impl Into<String>) -> &mut Self {
        let column = self.schema.type_column().to_string();
        self.where_eq(column, ptype)
    }

    /// Requires rule field `index` to equal `value`.
    pub fn where_field(&mut self, index: usize, value: impl Into<String>) -> &mut Self {
        self.conditions.push(Condition::Field {
            index,
            value: value.into(),
        });
        self
    }

    /// Restricts the query to the row with identity `id`.
    pub fn where_id(&mut self, id: i64) -> &mut Self {
        self.conditions.push(Condition::Id(id));
        self
    }

    /// Adds a raw SQL predicate. The fragment is trusted and inserted as is.
    pub fn where_raw(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.conditions.push(Condition::Raw(fragment.into()));
        self
    }

    /// Returns the number of conditions.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    fn column_for(&self, column: &str) -> Result<(), Report<StoreError>> {
        if self.schema.has_column(column) {
            Ok(())
        } else {
            Err(StoreError::UnknownColumn {
                column: column.to_string(),
            }
            .into())
        }
    }

    fn push_equality(stmt: &mut Statement, column: &str, value: &str) {
        if value.is_empty() {
            stmt.push("(")
                .push_ident(column)
                .push(" IS NULL OR ")
                .push_ident(column)
                .push(" = '')");
        } else {
            stmt.push_ident(column)
                .push(" = ")
                .push_bind(BindValue::Text(Some(value.to_string())));
        }
    }

    fn render_where(&self, stmt: &mut Statement) -> Result<(), Report<StoreError>> {
        for (i, condition) in self.conditions.iter().enumerate() {
            stmt.push(if i == 0 { " WHERE " } else { " AND " });
            match condition {
                Condition::Eq { column, value } => {
                    self.column_for(column)?;
                    Self::push_equality(stmt, column, value);
                }
                Condition::Field { index, value } => {
                    let column = self.schema.field_column(*index).ok_or_else(|| {
                        StoreError::FieldOutOfRange {
                            index: *index,
                            capacity: self.schema.field_capacity(),
                        }
                    })?;
                    Self::push_equality(stmt, column, value);
                }
                Condition::Id(id) => {
                    stmt.push_ident(IDENTITY_COLUMN)
                        .push(" = ")
                        .push_bind(BindValue::Int(*id));
                }
                Condition::Raw(fragment) => {
                    stmt.push("(").push(fragment).push(")");
                }
            }
        }
        Ok(())
    }

    fn push_column_list(&self, stmt: &mut Statement) {
        for (i, column) in self.schema.columns().iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push_ident(column);
        }
    }

    pub(crate) fn render_select(&self) -> Result<Statement, Report<StoreError>> {
        let mut stmt = Statement::new(self.dialect);
        stmt.push("SELECT ");
        self.push_column_list(&mut stmt);
        stmt.push(" FROM ").push_ident(self.schema.table_name());
        self.render_where(&mut stmt)?;
        Ok(stmt)
    }

    pub(crate) fn render_first_id(&self) -> Result<Statement, Report<StoreError>> {
        let mut stmt = Statement::new(self.dialect);
        stmt.push("SELECT ")
            .push_ident(IDENTITY_COLUMN)
            .push(" FROM ")
            .push_ident(self.schema.table_name());
        self.render_where(&mut stmt)?;
        stmt.push(" ORDER BY ")
            .push_ident(IDENTITY_COLUMN)
            .push(" LIMIT 1");
        Ok(stmt)
    }

    pub(crate) fn render_delete(&self) -> Result<Statement, Report<StoreError>> {
        let mut stmt = Statement::new(self.dialect);
        stmt.push("DELETE FROM ").push_ident(self.schema.table_name());
        self.render_where(&mut stmt)?;
        Ok(stmt)
    }

    pub(crate) fn render_update(
        &self,
        assignments: &[(String, Option<String>)],
    ) -> Result<Statement, Report<StoreError>> {
        let mut stmt = Statement::new(self.dialect);
        stmt.push("UPDATE ")
            .push_ident(self.schema.table_name())
            .push(" SET ");
        for (i, (column, value)) in assignments.iter().enumerate() {
            self.column_for(column)?;
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push_ident(column)
                .push(" = ")
                .push_bind(BindValue::Text(value.clone()));
        }
        self.render_where(&mut stmt)?;
        Ok(stmt)
    }

    /// Fetches every matching row.
    #[instrument(skip(self, conn), fields(table = %self.schema.table_name()))]
    pub async fn get(&self, conn: &mut AnyConnection) -> Result<Vec<RowValues>, Report<StoreError>> {
        let stmt = self.render_select()?;
        let rows = stmt.fetch_all(conn, "select").await?;
        let values = rows
            .iter()
            .map(|row| self.row_values(row))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = values.len(), "selected rules");
        Ok(values)
    }

    /// Fetches the matching row with the lowest identity.
    pub async fn first(
        &self,
        conn: &mut AnyConnection,
    ) -> Result<Option<RowValues>, Report<StoreError>> {
        let Some(id) = self.first_id(conn).await? else {
            return Ok(None);
        };
        let mut by_id = self.clone();
        by_id.where_id(id);
        Ok(by_id.get(conn).await?.into_iter().next())
    }

    /// Returns the identity of the matching row with the lowest identity.
    pub async fn first_id(
        &self,
        conn: &mut AnyConnection,
    ) -> Result<Option<i64>, Report<StoreError>> {
        let stmt = self.render_first_id()?;
        let row = stmt.fetch_optional(conn, "select").await?;
        match row {
            Some(row) => {
                let id: i64 = row
                    .try_get(0)
                    .map_err(StoreError::query_failed("select"))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Deletes every matching row and returns how many were removed.
    #[instrument(skip(self, conn), fields(table = %self.schema.table_name()))]
    pub async fn delete(&self, conn: &mut AnyConnection) -> Result<u64, Report<StoreError>> {
        let stmt = self.render_delete()?;
        let deleted = stmt.execute(conn, "delete").await?;
        debug!(deleted, "deleted rules");
        Ok(deleted)
    }

    /// Sets `assignments` (column, value) on every matching row.
    #[instrument(skip(self, conn, assignments), fields(table = %self.schema.table_name()))]
    pub async fn update(
        &self,
        conn: &mut AnyConnection,
        assignments: &[(String, Option<String>)],
    ) -> Result<u64, Report<StoreError>> {
        if assignments.is_empty() {
            return Ok(0);
        }
        let stmt = self.render_update(assignments)?;
        let updated = stmt.execute(conn, "update").await?;
        debug!(updated, "updated rules");
        Ok(updated)
    }

    fn row_values(&self, row: &AnyRow) -> Result<RowValues, Report<StoreError>> {
        (0..self.schema.columns().len())
            .map(|i| {
                row.try_get::<Option<String>, _>(i)
                    .map_err(|e| StoreError::query_failed("select")(e).into())
            })
            .collect()
    }
}
