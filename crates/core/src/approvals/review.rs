use std::sync::Arc;

use tracing::{info, warn};

use crate::approvals::machine::transition;
use crate::approvals::states::{ApprovalEvent, TransitionOutcome, WorkflowState};
use crate::approvals::workflow::{require_capability, require_reason, ApprovalError};
use crate::backend::ApprovalApi;
use crate::domain::approval::{ApprovalId, ApprovalRecord, ReviewAction, ReviewDecision};
use crate::session::{Actor, Capability};

/// Pending approval requests across all processes, as a reviewer sees them.
pub struct ReviewQueue {
    api: Arc<dyn ApprovalApi>,
    items: Vec<ApprovalRecord>,
}

impl ReviewQueue {
    pub fn new(api: Arc<dyn ApprovalApi>) -> Self {
        Self { api, items: Vec::new() }
    }

    pub fn items(&self) -> &[ApprovalRecord] {
        &self.items
    }

    pub async fn refresh(&mut self) -> Result<&[ApprovalRecord], ApprovalError> {
        let mut items = self.api.pending_approvals().await?;
        items.sort_by(|left, right| {
            left.requested_at.cmp(&right.requested_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        self.items = items;
        Ok(&self.items)
    }

    pub async fn approve(
        &mut self,
        approval_id: &ApprovalId,
        reviewer: &Actor,
    ) -> Result<TransitionOutcome, ApprovalError> {
        self.review(approval_id, reviewer, ReviewAction::Approved, None).await
    }

    pub async fn reject(
        &mut self,
        approval_id: &ApprovalId,
        reviewer: &Actor,
        reason: &str,
    ) -> Result<TransitionOutcome, ApprovalError> {
        self.review(approval_id, reviewer, ReviewAction::Rejected, Some(reason)).await
    }

    async fn review(
        &mut self,
        approval_id: &ApprovalId,
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

        let Some(record) = self.items.iter().find(|record| &record.id == approval_id) else {
            return Err(ApprovalError::Validation(format!(
                "approval `{approval_id}` is not in the review queue"
            )));
        };
        let outcome = transition(WorkflowState::from_latest(Some(record)), event)?;

        let decision = ReviewDecision {
            approval_id: approval_id.clone(),
            action,
            reviewed_by: reviewer.username.clone(),
            rejection_reason: reason.map(str::to_owned),
        };
        if let Err(error) = self.api.review_approval(decision).await {
            warn!(
                event_name = "approval.queue.review_failed",
                approval_id = %approval_id,
                error = %error,
                "review action failed; queue left unchanged"
            );
            return Err(error.into());
        }
        info!(
            event_name = "approval.queue.reviewed",
            approval_id = %approval_id,
            reviewed_by = %reviewer.username,
            action = ?action,
            "approval request reviewed"
        );

        self.refresh()
            .await
            .map_err(|error| match error {
                ApprovalError::Backend(source) => ApprovalError::Unconfirmed { action: event, source },
                other => other,
            })?;
        Ok(outcome)
    }
}
