//! SQL-backed policy adapter.

use crate::contract::{Adapter, BatchAdapter, FilteredAdapter, UpdatableAdapter};
use crate::error::AdapterError;
use crate::filter::Filter;
use crate::interceptor::{Operation, RuleInterceptor};
use async_trait::async_trait;
use policy_ledger_core::{
    PERSISTED_SECTIONS, PolicyModel, PolicyRow, TableSchema, decode, encode, load_policy_line,
};
use policy_ledger_store::{AnyConnection, RowValues, RuleQuery, RuleStore};
use rootcause::Report;
use sqlx::{Any, Transaction};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};

/// Highest number of rule fields a filtered removal can constrain.
pub const MAX_FILTER_FIELDS: usize = 6;

/// Keeps an authorization model in sync with one SQL table.
///
/// Every operation runs against the store's shared pool; nothing is cached.
/// `remove_policies`, `update_policies`, and `add_policies` run in a single
/// transaction each. Other multi-row operations are not isolated from
/// concurrent writers.
pub struct SqlAdapter {
    store: RuleStore,
    filtered: AtomicBool,
    interceptors: Vec<Arc<dyn RuleInterceptor>>,
}

impl SqlAdapter {
    /// Creates an adapter over `store`, creating the table if needed.
    pub async fn new(store: RuleStore) -> Result<Self, Report<AdapterError>> {
        let mut conn = store.acquire().await.map_err(AdapterError::backend)?;
        store
            .ensure_table(&mut conn)
            .await
            .map_err(AdapterError::backend)?;
        Ok(Self {
            store,
            filtered: AtomicBool::new(false),
            interceptors: Vec::new(),
        })
    }

    /// Appends an interceptor to the chain.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn RuleInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    fn schema(&self) -> &TableSchema {
        self.store.schema()
    }

    fn scoped(&self, operation: Operation, mut query: RuleQuery) -> RuleQuery {
        for interceptor in &self.interceptors {
            interceptor.scope(operation, &mut query);
        }
        query
    }

    fn authorize(
        &self,
        operation: Operation,
        ptype: &str,
        rule: &[String],
    ) -> Result<(), Report<AdapterError>> {
        for interceptor in &self.interceptors {
            interceptor.authorize(self.schema(), operation, ptype, rule)?;
        }
        Ok(())
    }

    fn check_width(&self, ptype: &str, rule: &[String]) -> Result<(), Report<AdapterError>> {
        let capacity = self.schema().field_capacity();
        if rule.len() > capacity {
            return Err(AdapterError::shape(format!(
                "rule of type '{ptype}' has {} fields but the table holds at most {capacity}",
                rule.len()
            ))
            .into());
        }
        Ok(())
    }

    fn encode_row(&self, ptype: &str, rule: &[String]) -> Result<PolicyRow, Report<AdapterError>> {
        encode(self.schema(), ptype, rule)
            .map_err(|e| AdapterError::shape(e.to_string()).into())
    }

    async fn connection(
        &self,
    ) -> Result<sqlx::pool::PoolConnection<Any>, Report<AdapterError>> {
        Ok(self.store.acquire().await.map_err(AdapterError::backend)?)
    }

    async fn begin(&self) -> Result<Transaction<'static, Any>, Report<AdapterError>> {
        Ok(self.store.begin().await.map_err(AdapterError::backend)?)
    }

    /// Commits `tx` if `result` is Ok, otherwise rolls back and returns the
    /// original error.
    async fn finish<T>(
        tx: Transaction<'static, Any>,
        result: Result<T, Report<AdapterError>>,
    ) -> Result<T, Report<AdapterError>> {
        match result {
            Ok(value) => {
                tx.commit().await.map_err(AdapterError::sql)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback after failed batch failed");
                }
                Err(e)
            }
        }
    }

    fn load_rows(rows: &[RowValues], model: &mut dyn PolicyModel) -> usize {
        let mut loaded = 0;
        for row in rows {
            let line = decode(row);
            if line.is_empty() {
                continue;
            }
            load_policy_line(&line, model);
            loaded += 1;
        }
        loaded
    }

    async fn remove_one(
        &self,
        conn: &mut AnyConnection,
        ptype: &str,
        rule: &[String],
    ) -> Result<u64, Report<AdapterError>> {
        self.check_width(ptype, rule)?;
        self.authorize(Operation::Delete, ptype, rule)?;

        let mut query = self.store.query();
        query.where_type(ptype);
        for (i, value) in rule.iter().enumerate() {
            if !value.is_empty() {
                query.where_field(i, value.as_str());
            }
        }
        let query = self.scoped(Operation::Delete, query);
        Ok(query.delete(conn).await.map_err(AdapterError::backend)?)
    }

    async fn update_one(
        &self,
        conn: &mut AnyConnection,
        ptype: &str,
        old_rule: &[String],
        new_rule: &[String],
    ) -> Result<u64, Report<AdapterError>> {
        self.check_width(ptype, old_rule)?;
        let new_row = self.encode_row(ptype, new_rule)?;
        self.authorize(Operation::Update, ptype, old_rule)?;
        self.authorize(Operation::Update, ptype, new_rule)?;

        let locate = self.scoped(
            Operation::Update,
            self.store.query_by_type_and_fields(ptype, old_rule),
        );
        let Some(id) = locate
            .first_id(&mut *conn)
            .await
            .map_err(AdapterError::backend)?
        else {
            debug!(ptype, "no stored rule matches the rule to update");
            return Ok(0);
        };

        // Only the positions the new rule covers are rewritten.
        let assignments: Vec<(String, Option<String>)> = self
            .schema()
            .field_columns()
            .iter()
            .cloned()
            .zip(new_row.values)
            .collect();

        let mut by_id = self.store.query();
        by_id.where_id(id);
        Ok(by_id
            .update(conn, &assignments)
            .await
            .map_err(AdapterError::backend)?)
    }

    async fn remove_all(
        &self,
        conn: &mut AnyConnection,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<u64, Report<AdapterError>> {
        let mut removed = 0;
        for rule in rules {
            removed += self.remove_one(&mut *conn, ptype, rule).await?;
        }
        Ok(removed)
    }

    async fn update_all(
        &self,
        conn: &mut AnyConnection,
        ptype: &str,
        old_rules: &[Vec<String>],
        new_rules: &[Vec<String>],
    ) -> Result<u64, Report<AdapterError>> {
        let mut updated = 0;
        for (old_rule, new_rule) in old_rules.iter().zip(new_rules) {
            updated += self
                .update_one(&mut *conn, ptype, old_rule, new_rule)
                .await?;
        }
        Ok(updated)
    }
}

#[async_trait]
impl Adapter for SqlAdapter {
    #[instrument(skip(self, model))]
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> Result<(), Report<AdapterError>> {
        let mut conn = self.connection().await?;
        let query = self.scoped(Operation::Read, self.store.query());
        let rows = query.get(&mut conn).await.map_err(AdapterError::backend)?;
        let loaded = Self::load_rows(&rows, model);
        debug!(rows = rows.len(), loaded, "loaded policy");
        Ok(())
    }

    #[instrument(skip(self, model))]
    async fn save_policy(&self, model: &dyn PolicyModel) -> Result<(), Report<AdapterError>> {
        let mut rows = Vec::new();
        for sec in PERSISTED_SECTIONS {
            for (ptype, rules) in model.rules(sec) {
                for rule in rules {
                    self.authorize(Operation::Insert, ptype, rule)?;
                    rows.push(self.encode_row(ptype, rule)?);
                }
            }
        }

        let mut conn = self.connection().await?;
        for row in &rows {
            self.store
                .insert_one(&mut conn, row)
                .await
                .map_err(AdapterError::backend)?;
        }
        debug!(saved = rows.len(), "saved policy");
        Ok(())
    }

    #[instrument(skip(self, rule))]
    async fn add_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> Result<(), Report<AdapterError>> {
        let row = self.encode_row(ptype, &rule)?;
        self.authorize(Operation::Insert, ptype, &rule)?;

        let mut conn = self.connection().await?;
        self.store
            .insert_one(&mut conn, &row)
            .await
            .map_err(AdapterError::backend)?;
        Ok(())
    }

    #[instrument(skip(self, rule))]
    async fn remove_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> Result<u64, Report<AdapterError>> {
        let mut conn = self.connection().await?;
        self.remove_one(&mut conn, ptype, &rule).await
    }

    #[instrument(skip(self, field_values))]
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> Result<u64, Report<AdapterError>> {
        let width = MAX_FILTER_FIELDS.min(self.schema().field_capacity());

        let mut query = self.store.query();
        query.where_type(ptype);
        let mut sparse = vec![String::new(); field_index.min(width)];
        for (offset, value) in field_values.iter().enumerate() {
            let position = field_index.saturating_add(offset);
            if position >= width {
                if !value.is_empty() {
                    debug!(position, width, "ignoring value beyond the filterable fields");
                }
                continue;
            }
            if !value.is_empty() {
                query.where_field(position, value.as_str());
            }
            sparse.push(value.clone());
        }
        self.authorize(Operation::Delete, ptype, &sparse)?;

        let query = self.scoped(Operation::Delete, query);
        let mut conn = self.connection().await?;
        Ok(query
            .delete(&mut conn)
            .await
            .map_err(AdapterError::backend)?)
    }
}

#[async_trait]
impl BatchAdapter for SqlAdapter {
    #[instrument(skip(self, rules), fields(count = rules.len()))]
    async fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<(), Report<AdapterError>> {
        let mut rows = Vec::with_capacity(rules.len());
        for rule in &rules {
            rows.push(self.encode_row(ptype, rule)?);
            self.authorize(Operation::Insert, ptype, rule)?;
        }
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.begin().await?;
        let result: Result<(), Report<AdapterError>> = self
            .store
            .insert_many(&mut tx, &rows)
            .await
            .map(|_| ())
            .map_err(|e| AdapterError::backend(e).into());
        Self::finish(tx, result).await
    }

    #[instrument(skip(self, rules), fields(count = rules.len()))]
    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<u64, Report<AdapterError>> {
        let mut tx = self.begin().await?;
        let result = self.remove_all(&mut tx, ptype, &rules).await;
        Self::finish(tx, result).await
    }
}

#[async_trait]
impl UpdatableAdapter for SqlAdapter {
    #[instrument(skip(self, old_rule, new_rule))]
    async fn update_policy(
        &self,
        sec: &str,
        ptype: &str,
        old_rule: Vec<String>,
        new_rule: Vec<String>,
    ) -> Result<u64, Report<AdapterError>> {
        let mut conn = self.connection().await?;
        self.update_one(&mut conn, ptype, &old_rule, &new_rule).await
    }

    #[instrument(skip(self, old_rules, new_rules))]
    async fn update_policies(
        &self,
        sec: &str,
        ptype: &str,
        old_rules: Vec<Vec<String>>,
        new_rules: Vec<Vec<String>>,
    ) -> Result<u64, Report<AdapterError>> {
        if old_rules.len() != new_rules.len() {
            return Err(AdapterError::shape(format!(
                "{} old rules but {} new rules",
                old_rules.len(),
                new_rules.len()
            ))
            .into());
        }

        let mut tx = self.begin().await?;
        let result = self
            .update_all(&mut tx, ptype, &old_rules, &new_rules)
            .await;
        Self::finish(tx, result).await
    }
}

#[async_trait]
impl FilteredAdapter for SqlAdapter {
    #[instrument(skip(self, model))]
    async fn load_filtered_policy(
        &self,
        model: &mut dyn PolicyModel,
        filter: Filter,
    ) -> Result<(), Report<AdapterError>> {
        let mut query = self.store.query();
        filter.apply(self.schema(), &mut query)?;
        let query = self.scoped(Operation::Read, query);

        let mut conn = self.connection().await?;
        let rows = query.get(&mut conn).await.map_err(AdapterError::backend)?;
        let loaded = Self::load_rows(&rows, model);
        debug!(rows = rows.len(), loaded, "loaded filtered policy");

        self.set_filtered(true);
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.filtered.load(Ordering::Acquire)
    }

    fn set_filtered(&self, filtered: bool) {
        self.filtered.store(filtered, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::FieldScope;
    use policy_ledger_core::MemoryModel;
    use policy_ledger_store::AnyPoolOptions;
    use std::time::Duration;

    async fn memory_adapter(schema: TableSchema) -> SqlAdapter {
        let options = AnyPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>);
        let store = RuleStore::connect("sqlite::memory:", options, schema)
            .await
            .expect("sqlite connects");
        SqlAdapter::new(store).await.expect("adapter builds")
    }

    async fn default_adapter() -> SqlAdapter {
        memory_adapter(TableSchema::default()).await
    }

    fn rule(fields: &[&str]) -> Vec<String> {
        fields.iter().map(ToString::to_string).collect()
    }

    async fn loaded(adapter: &SqlAdapter) -> MemoryModel {
        let mut model = MemoryModel::new();
        adapter.load_policy(&mut model).await.expect("load");
        model
    }

    async fn seed(adapter: &SqlAdapter, lines: &[(&str, &[&str])]) {
        for (ptype, fields) in lines {
            let sec = &ptype[..1];
            adapter
                .add_policy(sec, ptype, rule(fields))
                .await
                .expect("add");
        }
    }

    #[tokio::test]
    async fn add_load_remove_round_trip() {
        let schema = TableSchema::new("rules", ["type", "v0", "v1", "v2"]).expect("valid");
        let adapter = memory_adapter(schema).await;

        adapter
            .add_policy("p", "p", rule(&["alice", "data1", "read"]))
            .await
            .expect("add");
        let model = loaded(&adapter).await;
        assert_eq!(model.policy("p", "p"), [rule(&["alice", "data1", "read"])]);
        assert_eq!(model.len(), 1);

        let removed = adapter
            .remove_policy("p", "p", rule(&["alice", "data1", "read"]))
            .await
            .expect("remove");
        assert_eq!(removed, 1);
        assert!(loaded(&adapter).await.policy("p", "p").is_empty());
    }

    #[tokio::test]
    async fn adapter_creation_is_idempotent() {
        let adapter = default_adapter().await;
        seed(&adapter, &[("p", &["alice", "data1", "read"])]).await;

        let again = SqlAdapter::new(adapter.store().clone())
            .await
            .expect("second bootstrap");
        assert_eq!(loaded(&again).await.len(), 1);
    }

    #[tokio::test]
    async fn save_policy_writes_p_and_g_sections() {
        let adapter = default_adapter().await;
        let mut model = MemoryModel::new();
        load_policy_line("p, alice, data1, read", &mut model);
        load_policy_line("p2, bob, data2", &mut model);
        load_policy_line("g, alice, admin", &mut model);
        load_policy_line("g2, data1, group1", &mut model);

        adapter.save_policy(&model).await.expect("save");

        let reloaded = loaded(&adapter).await;
        assert_eq!(reloaded, model);
    }

    #[tokio::test]
    async fn load_skips_rows_without_fields() {
        let adapter = default_adapter().await;
        seed(&adapter, &[("p", &["alice", "data1", "read"])]).await;
        adapter
            .add_policy("p", "p", rule(&["", ""]))
            .await
            .expect("add");

        let model = loaded(&adapter).await;
        assert_eq!(model.len(), 1);
    }

    #[tokio::test]
    async fn add_policy_rejects_rules_wider_than_table() {
        let schema = TableSchema::new("rules", ["type", "v0", "v1"]).expect("valid");
        let adapter = memory_adapter(schema).await;
        let err = adapter
            .add_policy("p", "p", rule(&["alice", "data1", "read"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
        assert!(loaded(&adapter).await.is_empty());
    }

    #[tokio::test]
    async fn remove_policy_ignores_unset_fields() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[
                ("p", &["alice", "data1", "read"]),
                ("p", &["alice", "data2", "read"]),
                ("p", &["bob", "data1", "read"]),
            ],
        )
        .await;

        let removed = adapter
            .remove_policy("p", "p", rule(&["alice", "", "read"]))
            .await
            .expect("remove");
        assert_eq!(removed, 2);
        assert_eq!(loaded(&adapter).await.policy("p", "p"), [rule(&["bob", "data1", "read"])]);
    }

    #[tokio::test]
    async fn remove_filtered_policy_treats_empty_values_as_wildcards() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[
                ("p", &["alice", "data1", "bob"]),
                ("p", &["carol", "data2", "bob"]),
                ("p", &["alice", "data1", "read"]),
                ("g", &["alice", "bob", "bob"]),
            ],
        )
        .await;

        let removed = adapter
            .remove_filtered_policy("p", "p", 1, rule(&["", "bob"]))
            .await
            .expect("remove");
        assert_eq!(removed, 2);

        let model = loaded(&adapter).await;
        assert_eq!(model.policy("p", "p"), [rule(&["alice", "data1", "read"])]);
        assert_eq!(model.policy("g", "g").len(), 1);
    }

    #[tokio::test]
    async fn remove_filtered_policy_ignores_values_past_the_cap() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[("p", &["alice", "data1", "read"]), ("p", &["bob", "data1", "read"])],
        )
        .await;

        let removed = adapter
            .remove_filtered_policy("p", "p", 0, rule(&["alice", "", "", "", "", "", "extra"]))
            .await
            .expect("remove");
        assert_eq!(removed, 1);
        assert_eq!(loaded(&adapter).await.policy("p", "p"), [rule(&["bob", "data1", "read"])]);

        let removed = adapter
            .remove_filtered_policy("p", "p", 5, rule(&["", "x"]))
            .await
            .expect("remove");
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn remove_filtered_policy_with_huge_index_constrains_nothing() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[("p", &["alice", "data1", "read"]), ("g", &["alice", "admin"])],
        )
        .await;

        let removed = adapter
            .remove_filtered_policy("p", "p", usize::MAX, rule(&["", "x"]))
            .await
            .expect("remove");
        assert_eq!(removed, 1);
        assert_eq!(loaded(&adapter).await.lines(), ["g, alice, admin"]);
    }

    #[tokio::test]
    async fn remove_policies_rolls_back_on_backend_error() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[
                ("p", &["alice", "data1", "read"]),
                ("p", &["boom", "data1", "read"]),
                ("p", &["carol", "data1", "read"]),
            ],
        )
        .await;
        sqlx::query(
            "CREATE TRIGGER refuse_boom BEFORE DELETE ON casbin_rule \
             WHEN OLD.v0 = 'boom' BEGIN SELECT RAISE(ABORT, 'refused'); END",
        )
        .execute(adapter.store().pool())
        .await
        .expect("trigger");

        let err = adapter
            .remove_policies(
                "p",
                "p",
                vec![
                    rule(&["alice", "data1", "read"]),
                    rule(&["boom", "data1", "read"]),
                    rule(&["carol", "data1", "read"]),
                ],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("refused"));
        assert_eq!(loaded(&adapter).await.policy("p", "p").len(), 3);
    }

    #[tokio::test]
    async fn remove_policies_commits_all() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[
                ("p", &["alice", "data1", "read"]),
                ("p", &["bob", "data2", "write"]),
                ("p", &["carol", "data3", "read"]),
            ],
        )
        .await;

        let removed = adapter
            .remove_policies(
                "p",
                "p",
                vec![rule(&["alice", "data1", "read"]), rule(&["bob", "data2", "write"])],
            )
            .await
            .expect("remove");
        assert_eq!(removed, 2);
        assert_eq!(loaded(&adapter).await.len(), 1);
    }

    #[tokio::test]
    async fn add_then_update_policies() {
        let adapter = default_adapter().await;
        adapter
            .add_policies(
                "p",
                "p",
                vec![rule(&["a", "d1", "read"]), rule(&["b", "d2", "write"])],
            )
            .await
            .expect("add");

        let updated = adapter
            .update_policies(
                "p",
                "p",
                vec![rule(&["a", "d1", "read"])],
                vec![rule(&["a", "d1", "write"])],
            )
            .await
            .expect("update");
        assert_eq!(updated, 1);

        let model = loaded(&adapter).await;
        assert_eq!(model.policy("p", "p").len(), 2);
        assert!(model.has_rule("p", "p", &["a", "d1", "write"]));
        assert!(model.has_rule("p", "p", &["b", "d2", "write"]));
    }

    #[tokio::test]
    async fn update_policy_rewrites_a_single_duplicate() {
        let adapter = default_adapter().await;
        adapter
            .add_policies(
                "p",
                "p",
                vec![rule(&["a", "d1", "read"]), rule(&["a", "d1", "read"])],
            )
            .await
            .expect("add");

        let updated = adapter
            .update_policy("p", "p", rule(&["a", "d1", "read"]), rule(&["a", "d1", "write"]))
            .await
            .expect("update");
        assert_eq!(updated, 1);

        let rows = adapter
            .store()
            .select_all(&mut adapter.connection().await.expect("conn"))
            .await
            .expect("select");
        let mut lines: Vec<String> = rows.iter().map(|r| decode(r)).collect();
        lines.sort();
        assert_eq!(lines, ["p, a, d1, read", "p, a, d1, write"]);
    }

    #[tokio::test]
    async fn update_policy_keeps_fields_past_the_new_rule() {
        let adapter = default_adapter().await;
        seed(&adapter, &[("p", &["alice", "data1", "read", "allow"])]).await;

        let updated = adapter
            .update_policy(
                "p",
                "p",
                rule(&["alice", "data1", "read"]),
                rule(&["alice", "data1", "write"]),
            )
            .await
            .expect("update");
        assert_eq!(updated, 1);
        assert_eq!(loaded(&adapter).await.lines(), ["p, alice, data1, write, allow"]);
    }

    #[tokio::test]
    async fn update_policy_without_match_is_noop() {
        let adapter = default_adapter().await;
        seed(&adapter, &[("p", &["alice", "data1", "read"])]).await;
        let updated = adapter
            .update_policy("p", "p", rule(&["bob", "data1", "read"]), rule(&["bob", "data1", "write"]))
            .await
            .expect("update");
        assert_eq!(updated, 0);
        assert!(loaded(&adapter).await.has_rule("p", "p", &["alice", "data1", "read"]));
    }

    #[tokio::test]
    async fn update_policies_requires_equal_lengths() {
        let adapter = default_adapter().await;
        seed(&adapter, &[("p", &["a", "d1", "read"])]).await;
        let err = adapter
            .update_policies("p", "p", vec![rule(&["a", "d1", "read"])], vec![])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 old rules but 0 new rules"));
    }

    #[tokio::test]
    async fn update_policies_rolls_back_on_failure() {
        let adapter = default_adapter().await;
        adapter
            .add_policies(
                "p",
                "p",
                vec![rule(&["a", "d1", "read"]), rule(&["b", "d2", "read"])],
            )
            .await
            .expect("add");

        let err = adapter
            .update_policies(
                "p",
                "p",
                vec![rule(&["a", "d1", "read"]), rule(&["b", "d2", "read"])],
                vec![
                    rule(&["a", "d1", "write"]),
                    rule(&["b", "d2", "read", "x", "y", "z", "too-wide"]),
                ],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));

        let model = loaded(&adapter).await;
        assert!(model.has_rule("p", "p", &["a", "d1", "read"]));
        assert!(!model.has_rule("p", "p", &["a", "d1", "write"]));
    }

    #[tokio::test]
    async fn filtered_flag_lifecycle() {
        let adapter = default_adapter().await;
        assert!(!adapter.is_filtered());
        seed(
            &adapter,
            &[("p", &["alice", "data1", "read"]), ("p", &["bob", "data2", "write"])],
        )
        .await;

        let mut model = MemoryModel::new();
        adapter
            .load_filtered_policy(&mut model, Filter::equality([("v0", "alice")]))
            .await
            .expect("filtered load");
        assert!(adapter.is_filtered());
        assert_eq!(model.policy("p", "p"), [rule(&["alice", "data1", "read"])]);

        let full = loaded(&adapter).await;
        assert_eq!(full.len(), 2);
        assert!(adapter.is_filtered());

        adapter.set_filtered(false);
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn raw_and_predicate_filters() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[
                ("p", &["alice", "data1", "read"]),
                ("p", &["bob", "data2", "write"]),
                ("g", &["alice", "admin"]),
            ],
        )
        .await;

        let mut raw = MemoryModel::new();
        adapter
            .load_filtered_policy(&mut raw, Filter::raw("ptype = 'g'"))
            .await
            .expect("raw filter");
        assert_eq!(raw.lines(), ["g, alice, admin"]);

        let mut predicate = MemoryModel::new();
        adapter
            .load_filtered_policy(
                &mut predicate,
                Filter::predicate(|q| {
                    q.where_type("p").where_field(2, "write");
                }),
            )
            .await
            .expect("predicate filter");
        assert_eq!(predicate.lines(), ["p, bob, data2, write"]);
    }

    #[tokio::test]
    async fn invalid_filters_leave_flag_unset() {
        let adapter = default_adapter().await;
        let mut model = MemoryModel::new();

        let err = adapter
            .load_filtered_policy(&mut model, Filter::equality([("org_id", "1")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid filter type"));

        let err = adapter
            .load_filtered_policy(&mut model, Filter::raw("  "))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid filter type"));
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn field_scope_confines_reads_and_writes() {
        let adapter = default_adapter().await;
        seed(
            &adapter,
            &[
                ("p", &["alice", "tenant1", "data1", "read"]),
                ("p", &["bob", "tenant2", "data1", "read"]),
            ],
        )
        .await;
        let scoped = SqlAdapter::new(adapter.store().clone())
            .await
            .expect("adapter")
            .with_interceptor(Arc::new(FieldScope::new("v1", "tenant1")));

        let model = loaded(&scoped).await;
        assert_eq!(model.lines(), ["p, alice, tenant1, data1, read"]);

        let err = scoped
            .add_policy("p", "p", rule(&["carol", "tenant2", "data2", "read"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not authorized"));

        let removed = scoped
            .remove_filtered_policy("p", "p", 2, rule(&["data1"]))
            .await
            .expect("remove");
        assert_eq!(removed, 1);

        let everything = loaded(&adapter).await;
        assert_eq!(everything.lines(), ["p, bob, tenant2, data1, read"]);
    }
}
