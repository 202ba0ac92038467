//! The rule store: one table, one column layout.

use crate::dialect::Dialect;
use crate::error::StoreError;
use crate::query::{BindValue, RowValues, RuleQuery, Statement};
use policy_ledger_core::{IDENTITY_COLUMN, PolicyRow, TableSchema};
use rootcause::Report;
use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Column-mapped access to a single policy table.
///
/// The store owns no business logic: it maps [`PolicyRow`]s onto the
/// configured columns and runs statements on whatever connection it is given,
/// so callers decide whether work happens inside a transaction.
#[derive(Debug, Clone)]
pub struct RuleStore {
    pool: AnyPool,
    dialect: Dialect,
    schema: Arc<TableSchema>,
}

impl RuleStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: AnyPool, dialect: Dialect, schema: TableSchema) -> Self {
        Self {
            pool,
            dialect,
            schema: Arc::new(schema),
        }
    }

    /// Connects to `url` with the given pool options.
    ///
    /// The dialect is derived from the URL scheme.
    pub async fn connect(
        url: &str,
        options: AnyPoolOptions,
        schema: TableSchema,
    ) -> Result<Self, Report<StoreError>> {
        sqlx::any::install_default_drivers();
        let dialect = Dialect::from_url(url)?;
        let pool = options
            .connect(url)
            .await
            .map_err(|e| StoreError::ConnectFailed {
                details: e.to_string(),
            })?;
        info!(%dialect, table = schema.table_name(), "connected rule store");
        Ok(Self::new(pool, dialect, schema))
    }

    /// Returns the shared pool.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Returns the dialect of the backend.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the table schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Checks a connection out of the pool.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>, Report<StoreError>> {
        Ok(self
            .pool
            .acquire()
            .await
            .map_err(StoreError::query_failed("acquire"))?)
    }

    /// Begins a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Any>, Report<StoreError>> {
        Ok(self
            .pool
            .begin()
            .await
            .map_err(StoreError::query_failed("begin"))?)
    }

    /// Starts an unconstrained query over the table.
    #[must_use]
    pub fn query(&self) -> RuleQuery {
        RuleQuery::new(Arc::clone(&self.schema), self.dialect)
    }

    /// Starts a query matching `ptype` and each positional field of `fields`.
    #[must_use]
    pub fn query_by_type_and_fields<S: AsRef<str>>(&self, ptype: &str, fields: &[S]) -> RuleQuery {
        let mut query = self.query();
        query.where_type(ptype);
        for (i, value) in fields.iter().enumerate() {
            query.where_field(i, value.as_ref());
        }
        query
    }

    pub(crate) fn create_table_sql(&self) -> String {
        let mut stmt = Statement::new(self.dialect);
        stmt.push("CREATE TABLE IF NOT EXISTS ")
            .push_ident(self.schema.table_name())
            .push(" (")
            .push_ident(IDENTITY_COLUMN)
            .push(" ")
            .push(self.dialect.identity_definition());
        for column in self.schema.columns() {
            stmt.push(", ")
                .push_ident(column)
                .push(" ")
                .push(self.dialect.string_type());
        }
        stmt.push(")");
        stmt.sql
    }

    /// Creates the table if it does not exist yet.
    ///
    /// Safe to call repeatedly and from concurrently starting processes: a
    /// backend reporting that the table already exists counts as success.
    #[instrument(skip(self, conn), fields(table = %self.schema.table_name()))]
    pub async fn ensure_table(&self, conn: &mut AnyConnection) -> Result<(), Report<StoreError>> {
        let sql = self.create_table_sql();
        match sqlx::query(&sql).execute(&mut *conn).await {
            Ok(_) => {
                debug!("rule table ensured");
                Ok(())
            }
            Err(e) if is_already_exists(&e) => {
                warn!(error = %e, "rule table created concurrently");
                Ok(())
            }
            Err(e) => Err(StoreError::query_failed("create table")(e).into()),
        }
    }

    /// Selects every row, all configured columns, in no particular order.
    pub async fn select_all(
        &self,
        conn: &mut AnyConnection,
    ) -> Result<Vec<RowValues>, Report<StoreError>> {
        self.query().get(conn).await
    }

    /// Inserts one row.
    #[instrument(skip(self, conn, row), fields(table = %self.schema.table_name(), ptype = %row.ptype))]
    pub async fn insert_one(
        &self,
        conn: &mut AnyConnection,
        row: &PolicyRow,
    ) -> Result<(), Report<StoreError>> {
        self.insert_many(conn, std::slice::from_ref(row)).await?;
        Ok(())
    }

    /// Inserts rows with one multi-row statement.
    ///
    /// A batch is only split when it would exceed the backend's bind
    /// parameter limit; callers wanting all-or-nothing across chunks run this
    /// inside a transaction.
    #[instrument(skip(self, conn, rows), fields(table = %self.schema.table_name(), count = rows.len()))]
    pub async fn insert_many(
        &self,
        conn: &mut AnyConnection,
        rows: &[PolicyRow],
    ) -> Result<u64, Report<StoreError>> {
        if rows.is_empty() {
            return Ok(0);
        }

        let width = self.schema.columns().len();
        let chunk_size = (self.dialect.max_bind_params() / width).max(1);
        let mut inserted = 0;
        for chunk in rows.chunks(chunk_size) {
            let stmt = self.render_insert(chunk);
            inserted += stmt.execute(conn, "insert").await?;
        }
        debug!(inserted, "inserted rules");
        Ok(inserted)
    }

    fn render_insert(&self, rows: &[PolicyRow]) -> Statement {
        let capacity = self.schema.field_capacity();
        let mut stmt = Statement::new(self.dialect);
        stmt.push("INSERT INTO ")
            .push_ident(self.schema.table_name())
            .push(" (");
        for (i, column) in self.schema.columns().iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push_ident(column);
        }
        stmt.push(") VALUES ");
        for (r, row) in rows.iter().enumerate() {
            if r > 0 {
                stmt.push(", ");
            }
            stmt.push("(")
                .push_bind(BindValue::Text(Some(row.ptype.clone())));
            for value in row.padded(capacity) {
                stmt.push(", ").push_bind(BindValue::Text(value));
            }
            stmt.push(")");
        }
        stmt
    }
}

fn is_already_exists(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            // 42P07 duplicate_table and 23505 from the pg_type race on PostgreSQL, 1050 on MySQL.
            matches!(db.code().as_deref(), Some("42P07" | "23505" | "1050"))
                || db.message().contains("already exists")
        }
        _ => false,
    }
}
