use thiserror::Error;

use crate::approvals::states::{ApprovalEvent, TransitionOutcome, ViewMode, WorkflowState};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalTransitionError {
    #[error("invalid approval transition from {state:?} using event {event:?}")]
    InvalidTransition { state: WorkflowState, event: ApprovalEvent },
}

pub fn transition(
    current: WorkflowState,
    event: ApprovalEvent,
) -> Result<TransitionOutcome, ApprovalTransitionError> {
    use ApprovalEvent::{Approve, Reject, Request};
    use WorkflowState::{Approved, Pending, Rejected};

    let to = match (current, event) {
        (WorkflowState::None, Request) | (Rejected, Request) => Pending,
        (Pending, Approve) => Approved,
        (Pending, Reject) => Rejected,
        _ => {
            return Err(ApprovalTransitionError::InvalidTransition { state: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event })
}

/// Answers may be edited only by a non-reviewer while no request is pending
/// and the phase has not been approved.
pub fn can_edit(state: WorkflowState, mode: ViewMode) -> bool {
    mode != ViewMode::Review && !matches!(state, WorkflowState::Pending | WorkflowState::Approved)
}

#[cfg(test)]
mod tests {
    use super::{can_edit, transition, ApprovalTransitionError};
    use crate::approvals::states::{ApprovalEvent, ViewMode, WorkflowState};

    const ALL_STATES: [WorkflowState; 4] = [
        WorkflowState::None,
        WorkflowState::Pending,
        WorkflowState::Approved,
        WorkflowState::Rejected,
    ];

    #[test]
    fn request_reject_request_approve_cycle() {
        let mut state = WorkflowState::None;
        for (event, expected) in [
            (ApprovalEvent::Request, WorkflowState::Pending),
            (ApprovalEvent::Reject, WorkflowState::Rejected),
            (ApprovalEvent::Request, WorkflowState::Pending),
            (ApprovalEvent::Approve, WorkflowState::Approved),
        ] {
            let outcome = transition(state, event).expect("valid transition");
            assert_eq!(outcome.from, state);
            assert_eq!(outcome.to, expected);
            state = outcome.to;
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn pending_only_accepts_review_events() {
        let error = transition(WorkflowState::Pending, ApprovalEvent::Request)
            .expect_err("duplicate request must be rejected");
        assert_eq!(
            error,
            ApprovalTransitionError::InvalidTransition {
                state: WorkflowState::Pending,
                event: ApprovalEvent::Request
            }
        );
        assert!(transition(WorkflowState::Pending, ApprovalEvent::Approve).is_ok());
        assert!(transition(WorkflowState::Pending, ApprovalEvent::Reject).is_ok());
    }

    #[test]
    fn approved_is_terminal() {
        for event in [ApprovalEvent::Request, ApprovalEvent::Approve, ApprovalEvent::Reject] {
            assert!(transition(WorkflowState::Approved, event).is_err());
        }
    }

    #[test]
    fn review_events_require_pending() {
        for state in [WorkflowState::None, WorkflowState::Rejected] {
            assert!(transition(state, ApprovalEvent::Approve).is_err());
            assert!(transition(state, ApprovalEvent::Reject).is_err());
        }
    }

    #[test]
    fn edit_permission_truth_table() {
        for state in ALL_STATES {
            assert!(!can_edit(state, ViewMode::Review), "review mode never edits ({state:?})");
        }
        assert!(can_edit(WorkflowState::None, ViewMode::Editor));
        assert!(can_edit(WorkflowState::Rejected, ViewMode::Editor));
        assert!(!can_edit(WorkflowState::Pending, ViewMode::Editor));
        assert!(!can_edit(WorkflowState::Approved, ViewMode::Editor));
    }
}
