use proptest::prelude::*;
use upgrade_core::workflow::{allowed_transitions, validate_transition, WorkflowPhase};

#[test]
fn test_forward_path() {
    assert!(validate_transition(WorkflowPhase::NotStarted, WorkflowPhase::Preparing).is_ok());
    assert!(validate_transition(WorkflowPhase::Preparing, WorkflowPhase::Configuring).is_ok());
    assert!(validate_transition(WorkflowPhase::Configuring, WorkflowPhase::Upgrading).is_ok());
    assert!(validate_transition(WorkflowPhase::Upgrading, WorkflowPhase::Importing).is_ok());
    assert!(validate_transition(
        WorkflowPhase::Importing,
        WorkflowPhase::AwaitingRemoteCompletion
    )
    .is_ok());
    assert!(validate_transition(
        WorkflowPhase::AwaitingRemoteCompletion,
        WorkflowPhase::Complete
    )
    .is_ok());

    // No skipping ahead
    assert!(validate_transition(WorkflowPhase::Preparing, WorkflowPhase::Upgrading).is_err());
    assert!(validate_transition(WorkflowPhase::Upgrading, WorkflowPhase::Complete).is_err());
}

#[test]
fn test_live_phases_can_fail_or_cancel() {
    for from in WorkflowPhase::ALL.into_iter().filter(|p| !p.is_terminal()) {
        assert!(validate_transition(from, WorkflowPhase::Errored).is_ok());
        assert!(validate_transition(from, WorkflowPhase::Canceled).is_ok());
    }
}

#[test]
fn test_terminal_phases_are_final() {
    for from in [
        WorkflowPhase::Complete,
        WorkflowPhase::Errored,
        WorkflowPhase::Canceled,
    ] {
        assert!(allowed_transitions(from).is_empty());
        assert!(validate_transition(from, WorkflowPhase::Preparing).is_err());
    }
}

#[test]
fn test_only_remote_phases_poll() {
    let polling: Vec<_> = WorkflowPhase::ALL
        .into_iter()
        .filter(|p| p.polls_status())
        .collect();
    assert_eq!(
        polling,
        vec![
            WorkflowPhase::Importing,
            WorkflowPhase::AwaitingRemoteCompletion
        ]
    );
}

fn any_phase() -> impl Strategy<Value = WorkflowPhase> {
    prop_oneof![
        Just(WorkflowPhase::NotStarted),
        Just(WorkflowPhase::Preparing),
        Just(WorkflowPhase::Configuring),
        Just(WorkflowPhase::Upgrading),
        Just(WorkflowPhase::Importing),
        Just(WorkflowPhase::AwaitingRemoteCompletion),
        Just(WorkflowPhase::Complete),
        Just(WorkflowPhase::Errored),
        Just(WorkflowPhase::Canceled),
    ]
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_phase(), to in any_phase()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&to));
        } else {
            prop_assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_no_transition_out_of_terminal(from in any_phase(), to in any_phase()) {
        if from.is_terminal() {
            prop_assert!(validate_transition(from, to).is_err());
        }
    }
}
