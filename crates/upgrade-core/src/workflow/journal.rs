//! Append-only record of what the workflow did
//!
//! Holds phase transitions and the non-fatal diagnostics that never reach
//! the user: scan failures, discarded stale responses, reverted plan
//! overrides and teardown signals.

use super::WorkflowPhase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use upgrade_model::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum JournalKind {
    Transition {
        from: WorkflowPhase,
        to: WorkflowPhase,
    },
    ScanFailure {
        account_id: AccountId,
        error: String,
    },
    /// Response for an earlier selection or attempt was dropped
    StaleResponse {
        what: &'static str,
    },
    /// Plan override no longer offered; default restored
    PlanReverted,
    /// Cancel (`true`) or reset (`false`) sent to the background process
    Signal {
        cancel: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: JournalKind,
}

#[derive(Debug, Default, Clone)]
pub struct WorkflowJournal {
    entries: Vec<JournalEntry>,
}

impl WorkflowJournal {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its sequence number
    pub fn record(&mut self, kind: JournalKind) -> u64 {
        let seq = self.entries.len() as u64 + 1;
        self.entries.push(JournalEntry {
            seq,
            at: Utc::now(),
            kind,
        });
        seq
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Phases visited, starting with the first transition's source
    #[must_use]
    pub fn phases(&self) -> Vec<WorkflowPhase> {
        let mut phases = Vec::new();
        for entry in &self.entries {
            if let JournalKind::Transition { from, to } = entry.kind {
                if phases.is_empty() {
                    phases.push(from);
                }
                phases.push(to);
            }
        }
        phases
    }

    /// Cancel/reset signals in the order they were sent
    #[must_use]
    pub fn signals(&self) -> Vec<bool> {
        self.entries
            .iter()
            .filter_map(|e| match e.kind {
                JournalKind::Signal { cancel } => Some(cancel),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&JournalKind) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.kind)).count()
    }
}
