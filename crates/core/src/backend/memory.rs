use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::answer::{AnswerBatch, SaveReceipt};
use crate::domain::approval::{
    ApprovalId, ApprovalRecord, ApprovalStatus, NewApprovalRequest, ReviewAction, ReviewDecision,
};
use crate::domain::phase::{Phase, PhaseId, QuestionId};
use crate::domain::process::ProcessId;

use super::{ApiError, ApprovalApi, QuestionnaireApi};

/// Backend held entirely in memory, with the same conflict rules the REST
/// service enforces. Every call is counted and a failure can be armed for the
/// next call.
#[derive(Default)]
pub struct InMemoryBackend {
    phases: RwLock<HashMap<PhaseId, Phase>>,
    answers: RwLock<HashMap<(ProcessId, PhaseId), BTreeMap<QuestionId, String>>>,
    approvals: RwLock<Vec<ApprovalRecord>>,
    armed_failure: RwLock<Option<ApiError>>,
    calls: AtomicUsize,
}

impl InMemoryBackend {
    pub async fn insert_phase(&self, phase: Phase) {
        self.phases.write().await.insert(phase.id.clone(), phase);
    }

    pub async fn insert_raw_answer(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
        question_id: QuestionId,
        raw: impl Into<String>,
    ) {
        self.answers
            .write()
            .await
            .entry((process_id.clone(), phase_id.clone()))
            .or_default()
            .insert(question_id, raw.into());
    }

    pub async fn stored_answers(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
    ) -> BTreeMap<QuestionId, String> {
        self.answers
            .read()
            .await
            .get(&(process_id.clone(), phase_id.clone()))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn approval_history(&self) -> Vec<ApprovalRecord> {
        self.approvals.read().await.clone()
    }

    /// The next call fails with `error` instead of touching state.
    pub async fn fail_next_call(&self, error: ApiError) {
        *self.armed_failure.write().await = Some(error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.armed_failure.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn conflict(message: impl Into<String>) -> ApiError {
    ApiError::Status { status: 409, message: message.into() }
}

#[async_trait]
impl ApprovalApi for InMemoryBackend {
    async fn pending_approvals(&self) -> Result<Vec<ApprovalRecord>, ApiError> {
        self.enter().await?;
        let approvals = self.approvals.read().await;
        Ok(approvals
            .iter()
            .filter(|record| record.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn create_approval(&self, request: NewApprovalRequest) -> Result<(), ApiError> {
        self.enter().await?;
        let mut approvals = self.approvals.write().await;

        let latest = approvals.iter().rev().find(|record| {
            record.process_id == request.process_id && record.phase_id == request.phase_id
        });
        if let Some(latest) = latest {
            if latest.status != ApprovalStatus::Rejected {
                return Err(conflict(format!(
                    "phase `{}` already has a {:?} approval request",
                    request.phase_id, latest.status
                )));
            }
        }

        let id = ApprovalId(format!("A-{}", approvals.len() + 1));
        approvals.push(ApprovalRecord {
            id,
            process_id: request.process_id,
            phase_id: request.phase_id,
            phase_order: request.phase_order,
            phase_title: request.phase_title,
            status: ApprovalStatus::Pending,
            requested_by: request.requested_by,
            requested_at: Some(Utc::now()),
            comments: request.comments,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
        });
        Ok(())
    }

    async fn review_approval(&self, decision: ReviewDecision) -> Result<(), ApiError> {
        self.enter().await?;
        let mut approvals = self.approvals.write().await;

        let Some(record) = approvals.iter_mut().find(|record| record.id == decision.approval_id)
        else {
            return Err(ApiError::Status {
                status: 404,
                message: format!("approval `{}` not found", decision.approval_id),
            });
        };
        if record.status != ApprovalStatus::Pending {
            return Err(conflict(format!("approval `{}` was already reviewed", record.id)));
        }

        match decision.action {
            ReviewAction::Approved => {
                record.status = ApprovalStatus::Approved;
            }
            ReviewAction::Rejected => {
                let reason = decision.rejection_reason.filter(|reason| !reason.trim().is_empty());
                let Some(reason) = reason else {
                    return Err(ApiError::Status {
                        status: 400,
                        message: "rejectionReason is required".to_owned(),
                    });
                };
                record.status = ApprovalStatus::Rejected;
                record.rejection_reason = Some(reason);
            }
        }
        record.reviewed_by = Some(decision.reviewed_by);
        record.reviewed_at = Some(Utc::now());
        Ok(())
    }

    async fn latest_approval(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
    ) -> Result<Option<ApprovalRecord>, ApiError> {
        self.enter().await?;
        let approvals = self.approvals.read().await;
        Ok(approvals
            .iter()
            .rev()
            .find(|record| &record.process_id == process_id && &record.phase_id == phase_id)
            .cloned())
    }
}

#[async_trait]
impl QuestionnaireApi for InMemoryBackend {
    async fn phase(&self, phase_id: &PhaseId) -> Result<Phase, ApiError> {
        self.enter().await?;
        self.phases.read().await.get(phase_id).cloned().ok_or_else(|| ApiError::Status {
            status: 404,
            message: format!("phase `{phase_id}` not found"),
        })
    }

    async fn answers(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
    ) -> Result<HashMap<QuestionId, String>, ApiError> {
        self.enter().await?;
        let answers = self.answers.read().await;
        Ok(answers
            .get(&(process_id.clone(), phase_id.clone()))
            .map(|stored| stored.clone().into_iter().collect())
            .unwrap_or_default())
    }

    async fn save_answers(&self, batch: AnswerBatch) -> Result<SaveReceipt, ApiError> {
        self.enter().await?;
        let mut answers = self.answers.write().await;
        let stored = answers.entry((batch.process_id, batch.phase_id)).or_default();

        let saved_count = batch.answers.len();
        for entry in batch.answers {
            stored.insert(entry.question_id, entry.answer_value);
        }
        Ok(SaveReceipt { saved_count })
    }
}
