//! The adapter contract consumed by authorization-model loaders.

use crate::error::AdapterError;
use crate::filter::Filter;
use async_trait::async_trait;
use policy_ledger_core::PolicyModel;
use rootcause::Report;

/// Core persistence operations.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Loads every stored rule into `model`.
    async fn load_policy(&self, model: &mut dyn PolicyModel) -> Result<(), Report<AdapterError>>;

    /// Writes every `p` and `g` rule of `model` to storage, one row at a time.
    async fn save_policy(&self, model: &dyn PolicyModel) -> Result<(), Report<AdapterError>>;

    /// Stores one rule.
    async fn add_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> Result<(), Report<AdapterError>>;

    /// Removes every stored rule matching the non-empty fields of `rule`.
    async fn remove_policy(
        &self,
        sec: &str,
        ptype: &str,
        rule: Vec<String>,
    ) -> Result<u64, Report<AdapterError>>;

    /// Removes rules whose fields starting at `field_index` match
    /// `field_values`, with empty values acting as wildcards.
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> Result<u64, Report<AdapterError>>;
}

/// Multi-rule operations.
#[async_trait]
pub trait BatchAdapter: Adapter {
    /// Stores several rules in one batch.
    async fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<(), Report<AdapterError>>;

    /// Removes several rules atomically.
    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<u64, Report<AdapterError>>;
}

/// In-place rule rewrites.
#[async_trait]
pub trait UpdatableAdapter: Adapter {
    /// Replaces `old_rule` with `new_rule`.
    async fn update_policy(
        &self,
        sec: &str,
        ptype: &str,
        old_rule: Vec<String>,
        new_rule: Vec<String>,
    ) -> Result<u64, Report<AdapterError>>;

    /// Replaces each `old_rules[i]` with `new_rules[i]` atomically.
    async fn update_policies(
        &self,
        sec: &str,
        ptype: &str,
        old_rules: Vec<Vec<String>>,
        new_rules: Vec<Vec<String>>,
    ) -> Result<u64, Report<AdapterError>>;
}

/// Partial loading.
#[async_trait]
pub trait FilteredAdapter: Adapter {
    /// Loads only the rules selected by `filter`, then marks the adapter as
    /// filtered.
    async fn load_filtered_policy(
        &self,
        model: &mut dyn PolicyModel,
        filter: Filter,
    ) -> Result<(), Report<AdapterError>>;

    /// Returns true once a filtered load has succeeded.
    fn is_filtered(&self) -> bool;

    /// Overrides the filtered flag.
    fn set_filtered(&self, filtered: bool);
}
