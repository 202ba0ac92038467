//! # policyctl
//!
//! Operator CLI over a policy-ledger rule table.
//!
//! Connection settings come from the environment: `DATABASE_URL`,
//! `TABLE__NAME`, `TABLE__COLUMNS` (comma-separated, type column first) and
//! `MAX_CONNECTIONS`. Logging honours `RUST_LOG`.

mod commands;
mod config;
mod error;
mod policy_file;

use clap::Parser;
use crate::commands::Command;
use crate::config::CliConfig;
use crate::error::CliError;
use policy_ledger_adapter::SqlAdapter;
use policy_ledger_store::{AnyPoolOptions, RuleStore};
use rootcause::Report;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect and edit stored authorization rules
#[derive(Parser)]
#[command(name = "policyctl")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

async fn run(cli: Cli) -> Result<(), Report<CliError>> {
    let config = CliConfig::from_env().map_err(|e| CliError::Config {
        details: e.to_string(),
    })?;

    let options = AnyPoolOptions::new().max_connections(config.max_connections);
    let store = RuleStore::connect(&config.database_url, options, config.table)
        .await
        .map_err(CliError::operation)?;
    let adapter = SqlAdapter::new(store)
        .await
        .map_err(CliError::operation)?;

    let mut stdout = std::io::stdout().lock();
    commands::execute(&adapter, cli.command, &mut stdout).await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "policyctl failed");
        std::process::exit(1);
    }
}
