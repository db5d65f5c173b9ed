use std::sync::Arc;

use clap::ValueEnum;
use govflow_client::HttpBackend;
use govflow_core::approvals::{
    ApprovalError, ApprovalWorkflow, PhaseTarget, ReviewQueue, TransitionOutcome, ViewMode,
};
use govflow_core::backend::QuestionnaireApi;
use govflow_core::domain::approval::ApprovalId;
use govflow_core::domain::phase::PhaseId;
use govflow_core::domain::process::ProcessId;
use govflow_core::session::{Actor, Capability};
use serde_json::json;

use crate::commands::context::CommandContext;
use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Decision {
    Approve,
    Reject,
}

/// Pending requests across all processes, oldest first.
pub fn pending() -> CommandResult {
    match run_pending() {
        Ok(result) | Err(result) => result,
    }
}

fn run_pending() -> Result<CommandResult, CommandResult> {
    let mut context = CommandContext::open("pending")?;
    context.actor_with(Capability::ReviewApprovals)?;
    let backend = context.backend()?;

    let mut queue = ReviewQueue::new(backend);
    let refreshed = context.block_on(async { queue.refresh().await.map(<[_]>::to_vec) })?;
    let items = match refreshed {
        Ok(items) => items,
        Err(error) => return Err(approval_failure(&mut context, error)),
    };

    let message = format!("{} pending approval request(s)", items.len());
    Ok(CommandResult::success_with_data("pending", message, Some(json!(items))))
}

pub fn request(process_id: &str, phase_id: &str, comments: Option<String>) -> CommandResult {
    match run_request(process_id, phase_id, comments) {
        Ok(result) | Err(result) => result,
    }
}

fn run_request(
    process_id: &str,
    phase_id: &str,
    comments: Option<String>,
) -> Result<CommandResult, CommandResult> {
    let mut context = CommandContext::open("request")?;
    let actor = context.actor_with(Capability::RequestApproval)?;
    let mode = context.session()?.default_view_mode();
    let backend = context.backend()?;
    let process_id = ProcessId(process_id.trim().to_owned());
    let phase_id = PhaseId(phase_id.trim().to_owned());

    let requested =
        context.block_on(request_phase(backend, process_id, &phase_id, mode, &actor, comments))?;
    let outcome = match requested {
        Ok(outcome) => outcome,
        Err(error) => return Err(approval_failure(&mut context, error)),
    };

    Ok(CommandResult::success_with_data("request", outcome.notice().message, Some(json!(outcome))))
}

pub fn review(approval_id: &str, decision: Decision, reason: Option<&str>) -> CommandResult {
    match run_review(approval_id, decision, reason) {
        Ok(result) | Err(result) => result,
    }
}

fn run_review(
    approval_id: &str,
    decision: Decision,
    reason: Option<&str>,
) -> Result<CommandResult, CommandResult> {
    let mut context = CommandContext::open("review")?;
    let reviewer = context.actor_with(Capability::ReviewApprovals)?;
    let backend = context.backend()?;
    let approval_id = ApprovalId(approval_id.trim().to_owned());

    let mut queue = ReviewQueue::new(backend);
    let reviewed =
        context.block_on(review_one(&mut queue, &approval_id, &reviewer, decision, reason))?;
    let outcome = match reviewed {
        Ok(outcome) => outcome,
        Err(error) => return Err(approval_failure(&mut context, error)),
    };

    Ok(CommandResult::success_with_data("review", outcome.notice().message, Some(json!(outcome))))
}

async fn request_phase(
    backend: Arc<HttpBackend>,
    process_id: ProcessId,
    phase_id: &PhaseId,
    mode: ViewMode,
    requester: &Actor,
    comments: Option<String>,
) -> Result<TransitionOutcome, ApprovalError> {
    let phase = backend.phase(phase_id).await?;
    let target = PhaseTarget::for_phase(process_id, &phase);
    let mut workflow = ApprovalWorkflow::load(backend, target, mode).await?;
    workflow.request(requester, comments).await
}

async fn review_one(
    queue: &mut ReviewQueue,
    approval_id: &ApprovalId,
    reviewer: &Actor,
    decision: Decision,
    reason: Option<&str>,
) -> Result<TransitionOutcome, ApprovalError> {
    if decision == Decision::Reject && reason.map_or(true, |reason| reason.trim().is_empty()) {
        return Err(ApprovalError::Validation("A rejection reason is required.".to_owned()));
    }
    queue.refresh().await?;
    match decision {
        Decision::Approve => queue.approve(approval_id, reviewer).await,
        Decision::Reject => queue.reject(approval_id, reviewer, reason.unwrap_or_default()).await,
    }
}

fn approval_failure(context: &mut CommandContext, error: ApprovalError) -> CommandResult {
    let message = error.user_message();
    context.fail(error.into(), message)
}
