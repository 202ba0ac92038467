//! Conversion between policy rules and storage rows.

use crate::error::CodecError;
use crate::schema::TableSchema;
use rootcause::Report;

/// Separator used when joining row values into a policy line.
pub const LINE_SEPARATOR: &str = ", ";

/// A policy rule in storage form.
///
/// `values[i]` belongs to field column `i` of the schema. Unset fields are
/// stored as `None` (SQL NULL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRow {
    /// Policy type tag, stored in the type column.
    pub ptype: String,
    /// Field values in positional order.
    pub values: Vec<Option<String>>,
}

impl PolicyRow {
    /// Returns the values right-padded with NULLs to `width` fields.
    #[must_use]
    pub fn padded(&self, width: usize) -> Vec<Option<String>> {
        let mut values = self.values.clone();
        if values.len() < width {
            values.resize(width, None);
        }
        values
    }
}

/// Encodes a rule into a row for `schema`.
///
/// Empty tokens are stored as NULL. A rule with more fields than the table
/// has field columns is rejected instead of being truncated.
pub fn encode<S: AsRef<str>>(
    schema: &TableSchema,
    ptype: &str,
    rule: &[S],
) -> Result<PolicyRow, Report<CodecError>> {
    if rule.len() > schema.field_capacity() {
        return Err(CodecError::TooManyFields {
            ptype: ptype.to_string(),
            fields: rule.len(),
            capacity: schema.field_capacity(),
        }
        .into());
    }

    let values = rule
        .iter()
        .map(|token| {
            let token = token.as_ref();
            (!token.is_empty()).then(|| token.to_string())
        })
        .collect();

    Ok(PolicyRow {
        ptype: ptype.to_string(),
        values,
    })
}

/// Decodes stored values (type column first) into a policy line.
///
/// NULL and empty values are dropped wherever they appear, the rest are
/// joined with `", "` and the result is trimmed.
pub fn decode<S: AsRef<str>>(values: &[Option<S>]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(values.len());
    for value in values.iter().flatten() {
        let value: &str = value.as_ref();
        if !value.is_empty() {
            parts.push(value);
        }
    }
    parts.join(LINE_SEPARATOR).trim().to_string()
}
