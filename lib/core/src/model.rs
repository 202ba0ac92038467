//! The authorization model seam.
//!
//! The adapter never evaluates policies; it only moves rules between the
//! store and whatever model the authorization engine keeps in memory. That
//! model is reached through [`PolicyModel`].

use std::collections::BTreeMap;
use tracing::trace;

/// Sections the adapter persists.
pub const PERSISTED_SECTIONS: [&str; 2] = ["p", "g"];

/// An in-memory authorization model that rules can be loaded into and read
/// back from.
pub trait PolicyModel: Send + Sync {
    /// Inserts a rule into the bucket for `ptype` within section `sec`.
    ///
    /// Returns false if the model ignored the rule (e.g. already present).
    fn add_rule(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> bool;

    /// Returns every rule bucket of section `sec`, keyed by policy type.
    fn rules(&self, sec: &str) -> Vec<(&str, &[Vec<String>])>;
}

/// Tokenizes a comma-joined policy line and inserts it into `model`.
///
/// The first token is the policy type, and the section is the first
/// character of the type (`p2` belongs to `p`). Empty lines, comments, and
/// lines carrying only a type are ignored.
pub fn load_policy_line(line: &str, model: &mut dyn PolicyModel) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }

    let mut tokens = line.split(',').map(|t| t.trim().trim_matches('"'));
    let Some(ptype) = tokens.next().filter(|t| !t.is_empty()) else {
        return;
    };
    let rule: Vec<String> = tokens.map(ToString::to_string).collect();
    if rule.is_empty() {
        trace!(line, "ignoring policy line without fields");
        return;
    }

    let sec_len = ptype.chars().next().map_or(0, char::len_utf8);
    model.add_rule(&ptype[..sec_len], ptype, rule);
}

/// A plain in-memory model: section -> policy type -> rules.
///
/// Rules keep insertion order and duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryModel {
    sections: BTreeMap<String, BTreeMap<String, Vec<Vec<String>>>>,
}

impl MemoryModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules stored under `ptype` in section `sec`.
    #[must_use]
    pub fn policy(&self, sec: &str, ptype: &str) -> &[Vec<String>] {
        self.sections
            .get(sec)
            .and_then(|types| types.get(ptype))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns true if the exact rule is present.
    #[must_use]
    pub fn has_rule(&self, sec: &str, ptype: &str, rule: &[&str]) -> bool {
        self.policy(sec, ptype)
            .iter()
            .any(|r| r.iter().map(String::as_str).eq(rule.iter().copied()))
    }

    /// Returns the number of rules across all sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Returns true if the model holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every rule.
    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Renders every rule back into policy-line form, sections in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for types in self.sections.values() {
            for (ptype, rules) in types {
                for rule in rules {
                    let mut tokens = vec![ptype.as_str()];
                    tokens.extend(rule.iter().map(String::as_str));
                    lines.push(tokens.join(", "));
                }
            }
        }
        lines
    }
}

impl PolicyModel for MemoryModel {
    fn add_rule(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> bool {
        let bucket = self
            .sections
            .entry(sec.to_string())
            .or_default()
            .entry(ptype.to_string())
            .or_default();
        if bucket.contains(&rule) {
            return false;
        }
        bucket.push(rule);
        true
    }

    fn rules(&self, sec: &str) -> Vec<(&str, &[Vec<String>])> {
        self.sections
            .get(sec)
            .map(|types| {
                types
                    .iter()
                    .map(|(ptype, rules)| (ptype.as_str(), rules.as_slice()))
                    .collect()
            })
            .unwrap_or_default()
    }
}
