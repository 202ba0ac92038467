//! Reading policy files in comma-separated line form.

use crate::error::CliError;
use policy_ledger_core::{MemoryModel, load_policy_line};
use rootcause::Report;
use std::path::Path;

/// Parses a policy file into a model.
///
/// Each line is `ptype, field, ...`. Blank lines and `#` comments are skipped.
pub fn read_policy_file(path: &Path) -> Result<MemoryModel, Report<CliError>> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::PolicyFile {
        path: path.display().to_string(),
        details: e.to_string(),
    })?;
    Ok(parse_policy_text(&text))
}

fn parse_policy_text(text: &str) -> MemoryModel {
    let mut model = MemoryModel::new();
    for line in text.lines() {
        load_policy_line(line, &mut model);
    }
    model
}
