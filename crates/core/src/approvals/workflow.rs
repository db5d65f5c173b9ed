use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::approvals::machine::{can_edit, transition, ApprovalTransitionError};
use crate::approvals::states::{ApprovalEvent, TransitionOutcome, ViewMode, WorkflowState};
use crate::backend::{ApiError, ApprovalApi};
use crate::domain::approval::{
    ApprovalRecord, ApprovalStatus, NewApprovalRequest, ReviewAction, ReviewDecision,
};
use crate::domain::phase::{Phase, PhaseId};
use crate::domain::process::ProcessId;
use crate::errors::{ApplicationError, DomainError, Notice};
use crate::session::{Actor, Capability};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("`{username}` lacks the {capability:?} capability")]
    Forbidden { username: String, capability: Capability },
    #[error(transparent)]
    Transition(#[from] ApprovalTransitionError),
    #[error(transparent)]
    Backend(#[from] ApiError),
    #[error("{action:?} was accepted but the approval status could not be refreshed: {source}")]
    Unconfirmed { action: ApprovalEvent, source: ApiError },
}

impl ApprovalError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Forbidden { .. } => "You are not allowed to perform this action.".to_owned(),
            Self::Transition(ApprovalTransitionError::InvalidTransition { state, event }) => {
                match (state, event) {
                    (WorkflowState::Pending, ApprovalEvent::Request) => {
                        "An approval request is already pending for this phase.".to_owned()
                    }
                    (WorkflowState::Approved, _) => "This phase is already approved.".to_owned(),
                    _ => "This action is not available in the current approval state.".to_owned(),
                }
            }
            Self::Backend(ApiError::Unauthorized) => {
                "Your session has expired. Please sign in again.".to_owned()
            }
            Self::Backend(_) => {
                "The approval service could not be reached. Please retry.".to_owned()
            }
            Self::Unconfirmed { .. } => {
                "The action was recorded, but the latest status could not be loaded. Refresh to see it."
                    .to_owned()
            }
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error(self.user_message())
    }
}

impl From<ApprovalError> for ApplicationError {
    fn from(value: ApprovalError) -> Self {
        match value {
            ApprovalError::Validation(message) => DomainError::Validation(message).into(),
            ApprovalError::Forbidden { username, capability } => DomainError::Validation(
                format!("`{username}` lacks the {capability:?} capability"),
            )
            .into(),
            ApprovalError::Transition(error) => DomainError::ApprovalTransition(error).into(),
            ApprovalError::Backend(error) | ApprovalError::Unconfirmed { source: error, .. } => {
                Self::Backend(error)
            }
        }
    }
}

pub(crate) fn require_capability(
    actor: &Actor,
    capability: Capability,
) -> Result<(), ApprovalError> {
    if actor.username.trim().is_empty() {
        return Err(ApprovalError::Validation("an identified user is required".to_owned()));
    }
    if !actor.can(capability) {
        return Err(ApprovalError::Forbidden { username: actor.username.clone(), capability });
    }
    Ok(())
}

pub(crate) fn require_reason(reason: &str) -> Result<(), ApprovalError> {
    if reason.trim().is_empty() {
        return Err(ApprovalError::Validation("A rejection reason is required.".to_owned()));
    }
    Ok(())
}

/// The (process, phase) pair an approval workflow is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseTarget {
    pub process_id: ProcessId,
    pub phase_id: PhaseId,
    pub phase_order: u32,
    pub phase_title: String,
}

impl PhaseTarget {
    pub fn for_phase(process_id: ProcessId, phase: &Phase) -> Self {
        Self {
            process_id,
            phase_id: phase.id.clone(),
            phase_order: phase.order,
            phase_title: phase.title.clone(),
        }
    }
}

/// Client-side view of one phase's approval workflow.
///
/// The cached record is only ever replaced by what the backend reports; every
/// successful action is followed by a re-fetch.
pub struct ApprovalWorkflow {
    api: Arc<dyn ApprovalApi>,
    target: PhaseTarget,
    mode: ViewMode,
    latest: Option<ApprovalRecord>,
    prior_rejection_reason: Option<String>,
}

impl ApprovalWorkflow {
    pub fn new(api: Arc<dyn ApprovalApi>, target: PhaseTarget, mode: ViewMode) -> Self {
        Self { api, target, mode, latest: None, prior_rejection_reason: None }
    }

    pub async fn load(
        api: Arc<dyn ApprovalApi>,
        target: PhaseTarget,
        mode: ViewMode,
    ) -> Result<Self, ApprovalError> {
        let mut workflow = Self::new(api, target, mode);
        workflow.refresh().await?;
        Ok(workflow)
    }

    pub fn target(&self) -> &PhaseTarget {
        &self.target
    }

    pub fn state(&self) -> WorkflowState {
        WorkflowState::from_latest(self.latest.as_ref())
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn can_edit(&self) -> bool {
        can_edit(self.state(), self.mode)
    }

    pub fn latest(&self) -> Option<&ApprovalRecord> {
        self.latest.as_ref()
    }

    /// Rejection reason to show next to the phase: the current one when
    /// rejected, or the previous one while a re-request is pending.
    pub fn visible_rejection_reason(&self) -> Option<&str> {
        match self.state() {
            WorkflowState::Rejected => {
                self.latest.as_ref().and_then(|record| record.rejection_reason.as_deref())
            }
            WorkflowState::Pending => self.prior_rejection_reason.as_deref(),
            WorkflowState::None | WorkflowState::Approved => None,
        }
    }

    pub async fn refresh(&mut self) -> Result<WorkflowState, ApprovalError> {
        self.validate_target()?;
        let latest =
            self.api.latest_approval(&self.target.process_id, &self.target.phase_id).await?;
        self.apply_latest(latest);
        Ok(self.state())
    }

    pub async fn request(
        &mut self,
        requester: &Actor,
        comments: Option<String>,
    ) -> Result<TransitionOutcome, ApprovalError> {
        self.validate_target()?;
        require_capability(requester, Capability::RequestApproval)?;
        let outcome = transition(self.state(), ApprovalEvent::Request)?;

        let comments =
            comments.map(|text| text.trim().to_owned()).filter(|text| !text.is_empty());
        let request = NewApprovalRequest {
            process_id: self.target.process_id.clone(),
            phase_id: self.target.phase_id.clone(),
            phase_order: self.target.phase_order,
            phase_title: self.target.phase_title.clone(),
            requested_by: requester.username.clone(),
            comments,
        };

        if let Err(error) = self.api.create_approval(request).await {
            self.log_failure(ApprovalEvent::Request, &error);
            return Err(error.into());
        }
        info!(
            event_name = "approval.requested",
            process_id = %self.target.process_id,
            phase_id = %self.target.phase_id,
            requested_by = %requester.username,
            "phase approval requested"
        );

        self.confirm(outcome).await
    }

    pub async fn approve(&mut self, reviewer: &Actor) -> Result<TransitionOutcome, ApprovalError> {
        self.review(reviewer, ReviewAction::Approved, None).await
    }

    pub async fn reject(
        &mut self,
        reviewer: &Actor,
        reason: &str,
    ) -> Result<TransitionOutcome, ApprovalError> {
        self.review(reviewer, ReviewAction::Rejected, Some(reason)).await
    }

    async fn review(
        &mut self,
        reviewer: &Actor,
        action: ReviewAction,
        reason: Option<&str>,
    ) -> Result<TransitionOutcome, ApprovalError> {
        require_capability(reviewer, Capability::ReviewApprovals)?;
        let event = match action {
            ReviewAction::Approved => ApprovalEvent::Approve,
            ReviewAction::Rejected => {
                require_reason(reason.unwrap_or_default())?;
                ApprovalEvent::Reject
            }
        };
        let outcome = transition(self.state(), event)?;

        let Some(approval_id) = self.latest.as_ref().map(|record| record.id.clone()) else {
            return Err(ApprovalError::Validation("no approval request to review".to_owned()));
        };
        let decision = ReviewDecision {
            approval_id,
            action,
            reviewed_by: reviewer.username.clone(),
            rejection_reason: reason.map(str::to_owned),
        };

        if let Err(error) = self.api.review_approval(decision).await {
            self.log_failure(event, &error);
            return Err(error.into());
        }
        info!(
            event_name = "approval.reviewed",
            process_id = %self.target.process_id,
            phase_id = %self.target.phase_id,
            reviewed_by = %reviewer.username,
            action = ?action,
            "phase approval reviewed"
        );

        self.confirm(outcome).await
    }

    async fn confirm(
        &mut self,
        expected: TransitionOutcome,
    ) -> Result<TransitionOutcome, ApprovalError> {
        let latest = self
            .api
            .latest_approval(&self.target.process_id, &self.target.phase_id)
            .await
            .map_err(|source| {
                warn!(
                    event_name = "approval.refresh_failed",
                    process_id = %self.target.process_id,
                    phase_id = %self.target.phase_id,
                    error = %source,
                    "approval status could not be re-fetched"
                );
                ApprovalError::Unconfirmed { action: expected.event, source }
            })?;
        self.apply_latest(latest);

        let observed = self.state();
        if observed != expected.to {
            warn!(
                event_name = "approval.state_diverged",
                expected = ?expected.to,
                observed = ?observed,
                "backend reports a different approval state than the applied transition"
            );
        }
        Ok(TransitionOutcome { to: observed, ..expected })
    }

    fn apply_latest(&mut self, latest: Option<ApprovalRecord>) {
        match latest.as_ref().map(|record| record.status) {
            Some(ApprovalStatus::Pending) => {
                let previous_rejection = self
                    .latest
                    .as_ref()
                    .filter(|record| record.status == ApprovalStatus::Rejected)
                    .and_then(|record| record.rejection_reason.clone());
                if previous_rejection.is_some() {
                    self.prior_rejection_reason = previous_rejection;
                }
            }
            Some(ApprovalStatus::Approved) | Some(ApprovalStatus::Rejected) | None => {
                self.prior_rejection_reason = None;
            }
        }
        self.latest = latest;
    }

    fn validate_target(&self) -> Result<(), ApprovalError> {
        if self.target.process_id.is_blank() || self.target.phase_id.is_blank() {
            return Err(ApprovalError::Validation(
                "process and phase identifiers are required".to_owned(),
            ));
        }
        Ok(())
    }

    fn log_failure(&self, event: ApprovalEvent, error: &ApiError) {
        warn!(
            event_name = "approval.action_failed",
            process_id = %self.target.process_id,
            phase_id = %self.target.phase_id,
            event = ?event,
            error = %error,
            "approval action failed; state left unchanged"
        );
    }
}
