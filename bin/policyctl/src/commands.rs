//! Subcommands and their execution against an adapter.

use crate::error::CliError;
use crate::policy_file::read_policy_file;
use clap::Subcommand;
use policy_ledger_adapter::{Adapter, Filter, FilteredAdapter, SqlAdapter};
use policy_ledger_core::MemoryModel;
use rootcause::Report;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the rule table if it does not exist
    Init,

    /// Print stored rules, one policy line each
    List {
        /// JSON filter: a SQL string or an object of column/value pairs
        #[arg(long, value_name = "JSON")]
        filter: Option<String>,
    },

    /// Store one rule
    Add {
        ptype: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Remove rules matching the given fields; pass "" to match any value
    Remove {
        ptype: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Remove rules whose fields starting at --index match the given values
    RemoveFiltered {
        ptype: String,
        #[arg(long, default_value_t = 0)]
        index: usize,
        values: Vec<String>,
    },

    /// Save every rule of a policy file
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Returns the model section a policy type belongs to.
pub fn section_of(ptype: &str) -> Result<&str, Report<CliError>> {
    let Some(first) = ptype.chars().next() else {
        return Err(CliError::InvalidArgument {
            details: "policy type is empty".to_string(),
        }
        .into());
    };
    Ok(&ptype[..first.len_utf8()])
}

/// Runs `command`, writing any listing to `out`.
pub async fn execute(
    adapter: &SqlAdapter,
    command: Command,
    out: &mut impl Write,
) -> Result<(), Report<CliError>> {
    match command {
        Command::Init => {
            let store = adapter.store();
            let mut conn = store.acquire().await.map_err(CliError::operation)?;
            store
                .ensure_table(&mut conn)
                .await
                .map_err(CliError::operation)?;
            info!(table = store.schema().table_name(), "rule table ready");
        }
        Command::List { filter } => {
            let mut model = MemoryModel::new();
            match filter {
                Some(json) => {
                    let value: serde_json::Value =
                        serde_json::from_str(&json).map_err(|e| CliError::InvalidArgument {
                            details: format!("filter is not valid JSON: {e}"),
                        })?;
                    let filter = Filter::from_json(&value).map_err(CliError::operation)?;
                    adapter
                        .load_filtered_policy(&mut model, filter)
                        .await
                        .map_err(CliError::operation)?;
                }
                None => {
                    adapter
                        .load_policy(&mut model)
                        .await
                        .map_err(CliError::operation)?;
                }
            }
            for line in model.lines() {
                writeln!(out, "{line}").map_err(CliError::operation)?;
            }
        }
        Command::Add { ptype, fields } => {
            let sec = section_of(&ptype)?;
            adapter
                .add_policy(sec, &ptype, fields)
                .await
                .map_err(CliError::operation)?;
            info!(ptype = %ptype, "rule added");
        }
        Command::Remove { ptype, fields } => {
            let sec = section_of(&ptype)?;
            let removed = adapter
                .remove_policy(sec, &ptype, fields)
                .await
                .map_err(CliError::operation)?;
            info!(ptype = %ptype, removed, "rules removed");
        }
        Command::RemoveFiltered {
            ptype,
            index,
            values,
        } => {
            let sec = section_of(&ptype)?;
            let removed = adapter
                .remove_filtered_policy(sec, &ptype, index, values)
                .await
                .map_err(CliError::operation)?;
            info!(ptype = %ptype, removed, "rules removed");
        }
        Command::Import { file } => {
            let model = read_policy_file(&file)?;
            adapter
                .save_policy(&model)
                .await
                .map_err(CliError::operation)?;
            info!(file = %file.display(), rules = model.len(), "policy imported");
        }
    }
    Ok(())
}
