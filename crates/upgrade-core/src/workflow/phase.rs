//! Workflow phases and the transition table

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};

/// Phase of the upgrade workflow
///
/// The single source of truth for what the user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// No attempt begun
    NotStarted,
    /// Catalog load and eligibility scan in flight
    Preparing,
    /// Waiting for the user to configure and submit
    Configuring,
    /// Upgrade request submitted
    Upgrading,
    /// Remote side reported the import; refresh timer running
    Importing,
    /// Import finished, remote side still finalizing
    AwaitingRemoteCompletion,
    Complete,
    Errored,
    Canceled,
}

impl WorkflowPhase {
    pub const ALL: [WorkflowPhase; 9] = [
        WorkflowPhase::NotStarted,
        WorkflowPhase::Preparing,
        WorkflowPhase::Configuring,
        WorkflowPhase::Upgrading,
        WorkflowPhase::Importing,
        WorkflowPhase::AwaitingRemoteCompletion,
        WorkflowPhase::Complete,
        WorkflowPhase::Errored,
        WorkflowPhase::Canceled,
    ];

    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowPhase::Complete | WorkflowPhase::Errored | WorkflowPhase::Canceled
        )
    }

    /// Phases that show a progress status line
    #[inline]
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            WorkflowPhase::Preparing
                | WorkflowPhase::Upgrading
                | WorkflowPhase::Importing
                | WorkflowPhase::AwaitingRemoteCompletion
        )
    }

    /// Phases in which the refresh timer runs
    #[inline]
    #[must_use]
    pub fn polls_status(self) -> bool {
        matches!(
            self,
            WorkflowPhase::Importing | WorkflowPhase::AwaitingRemoteCompletion
        )
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowPhase::NotStarted => "not started",
            WorkflowPhase::Preparing => "preparing",
            WorkflowPhase::Configuring => "configuring",
            WorkflowPhase::Upgrading => "upgrading",
            WorkflowPhase::Importing => "importing",
            WorkflowPhase::AwaitingRemoteCompletion => "awaiting remote completion",
            WorkflowPhase::Complete => "complete",
            WorkflowPhase::Errored => "errored",
            WorkflowPhase::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// Phases reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: WorkflowPhase) -> Vec<WorkflowPhase> {
    use WorkflowPhase::*;
    match from {
        NotStarted => vec![Preparing, Errored, Canceled],
        Preparing => vec![Configuring, Errored, Canceled],
        Configuring => vec![Upgrading, Errored, Canceled],
        Upgrading => vec![Importing, Errored, Canceled],
        Importing => vec![AwaitingRemoteCompletion, Errored, Canceled],
        AwaitingRemoteCompletion => vec![Complete, Errored, Canceled],
        Complete | Errored | Canceled => vec![],
    }
}

/// Check a transition against the table
///
/// # Errors
/// `WorkflowError::IllegalTransition` when `to` is not reachable from `from`.
pub fn validate_transition(from: WorkflowPhase, to: WorkflowPhase) -> Result<(), WorkflowError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkflowError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases_have_no_exits() {
        for phase in WorkflowPhase::ALL {
            assert_eq!(phase.is_terminal(), allowed_transitions(phase).is_empty());
        }
    }

    #[test]
    fn every_live_phase_can_fail_and_cancel() {
        for phase in WorkflowPhase::ALL.into_iter().filter(|p| !p.is_terminal()) {
            assert!(validate_transition(phase, WorkflowPhase::Errored).is_ok());
            assert!(validate_transition(phase, WorkflowPhase::Canceled).is_ok());
        }
    }

    #[test]
    fn import_cannot_be_skipped() {
        assert!(validate_transition(WorkflowPhase::Upgrading, WorkflowPhase::Complete).is_err());
        assert!(validate_transition(
            WorkflowPhase::Upgrading,
            WorkflowPhase::AwaitingRemoteCompletion
        )
        .is_err());
    }
}
