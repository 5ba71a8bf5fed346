//! ID validation report

use crate::batch::BatchOutcome;
use crate::client::RootId;
use crate::fanout::{FanOutResult, LookupOutcome};
use cgtools_common::InputId;
use std::time::Duration;

/// Reason for IDs whose leaf never got a root
pub const LOOKUP_FAILED_REASON: &str = "lookup failed";
/// Separates the header block from the result lines
pub const RESULTS_MARKER: &str = "---RESULTS---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEntry {
    /// ID is still the current root
    Unchanged,
    /// ID has been superseded by this root
    Changed(RootId),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// One entry per input ID, in input order
    pub entries: Vec<(InputId, ValidationEntry)>,
}

impl ValidationReport {
    pub fn assemble(
        ids: &[InputId],
        stage_a: &FanOutResult,
        roots: &BatchOutcome<RootId>,
    ) -> Self {
        let entries = ids
            .iter()
            .map(|&id| (id, classify(id, stage_a, roots)))
            .collect();
        Self { entries }
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn changed_count(&self) -> usize {
        self.count(|e| matches!(e, ValidationEntry::Changed(_)))
    }

    pub fn unchanged_count(&self) -> usize {
        self.count(|e| matches!(e, ValidationEntry::Unchanged))
    }

    pub fn error_count(&self) -> usize {
        self.count(|e| matches!(e, ValidationEntry::Error(_)))
    }

    fn count(&self, pred: impl Fn(&ValidationEntry) -> bool) -> usize {
        self.entries.iter().filter(|(_, e)| pred(e)).count()
    }

    /// The ID to use going forward: the new root when changed, otherwise the input
    pub fn current_ids(&self) -> Vec<InputId> {
        self.entries
            .iter()
            .map(|(id, entry)| match entry {
                ValidationEntry::Changed(new_id) => *new_id,
                _ => *id,
            })
            .collect()
    }

    pub fn result_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(id, entry)| match entry {
                ValidationEntry::Unchanged => format!("{}    [OK - Current]", id),
                ValidationEntry::Changed(new_id) => format!("{}    ->    {}", id, new_id),
                ValidationEntry::Error(reason) => format!("# ERROR: {} - {}", id, reason),
            })
            .collect()
    }

    /// Full report file: commented header, marker, then one line per ID
    pub fn render(&self, elapsed: Duration, workers: usize) -> String {
        let mut out = String::new();
        out.push_str("# ID Validation Report\n");
        out.push_str(&format!("# Total IDs: {}\n", self.total()));
        out.push_str(&format!("# Changed: {}\n", self.changed_count()));
        out.push_str(&format!("# Unchanged: {}\n", self.unchanged_count()));
        out.push_str(&format!("# Errors: {}\n", self.error_count()));
        out.push_str(&format!("# Time: {:.1}s\n", elapsed.as_secs_f64()));
        out.push_str(&format!("# Workers: {}\n", workers));
        out.push_str(&format!("\n{}\n\n", RESULTS_MARKER));
        out.push_str(&self.result_lines().join("\n"));
        out
    }

    /// Sibling file with one current ID per line
    pub fn render_clean_ids(&self) -> String {
        self.current_ids()
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn classify(id: InputId, stage_a: &FanOutResult, roots: &BatchOutcome<RootId>) -> ValidationEntry {
    let leaf = match stage_a.outcome(id) {
        Some(LookupOutcome::Resolved(leaf)) => leaf,
        Some(LookupOutcome::Failed(reason)) => return ValidationEntry::Error(reason),
        None => return ValidationEntry::Error(LOOKUP_FAILED_REASON.to_string()),
    };

    match roots.resolved.get(&leaf) {
        Some(&root) if root == id => ValidationEntry::Unchanged,
        Some(&root) => ValidationEntry::Changed(root),
        None => match roots.failed.get(&leaf) {
            Some(reason) => ValidationEntry::Error(format!("root lookup failed: {}", reason)),
            None => ValidationEntry::Error(LOOKUP_FAILED_REASON.to_string()),
        },
    }
}
