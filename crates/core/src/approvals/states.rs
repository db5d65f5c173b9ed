use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalRecord, ApprovalStatus};
use crate::errors::Notice;

/// Approval state of one phase as seen by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    None,
    Pending,
    Approved,
    Rejected,
}

impl WorkflowState {
    pub fn from_latest(latest: Option<&ApprovalRecord>) -> Self {
        match latest.map(|record| record.status) {
            None => Self::None,
            Some(ApprovalStatus::Pending) => Self::Pending,
            Some(ApprovalStatus::Approved) => Self::Approved,
            Some(ApprovalStatus::Rejected) => Self::Rejected,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalEvent {
    Request,
    Approve,
    Reject,
}

/// Whether the viewer is the phase owner or a reviewer looking at it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Editor,
    Review,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub event: ApprovalEvent,
}

impl TransitionOutcome {
    pub fn notice(&self) -> Notice {
        let message = match (self.event, self.to) {
            (ApprovalEvent::Request, WorkflowState::Pending) => "Approval requested for this phase.",
            (ApprovalEvent::Approve, WorkflowState::Approved) => "Phase approved.",
            (ApprovalEvent::Reject, WorkflowState::Rejected) => "Phase rejected.",
            _ => "Action recorded. The approval status has changed since it was loaded.",
        };
        Notice::success(message)
    }
}
