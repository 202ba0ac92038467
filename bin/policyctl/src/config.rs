//! CLI configuration.
//!
//! Loaded via the `config` crate from environment variables, using `__` to
//! separate nested keys (`TABLE__NAME`, `TABLE__COLUMNS`).

use policy_ledger_core::TableSchema;
use serde::Deserialize;

/// Everything `policyctl` needs to reach a rule table.
#[derive(Debug, Deserialize)]
pub struct CliConfig {
    /// Backend connection URL; its scheme selects the SQL dialect.
    pub database_url: String,

    /// Table layout. Columns are a comma-separated list, type column first.
    #[serde(default)]
    pub table: TableSchema,

    /// Upper bound on pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl CliConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or the table layout is
    /// invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                env.separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("table.columns"),
            )
            .build()?
            .try_deserialize()
    }
}
