use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::answer::{AnswerBatch, SaveReceipt};
use crate::domain::approval::{ApprovalRecord, NewApprovalRequest, ReviewDecision};
use crate::domain::phase::{Phase, PhaseId, QuestionId};
use crate::domain::process::ProcessId;

pub mod memory;

pub use memory::InMemoryBackend;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("session is no longer authorized")]
    Unauthorized,
    #[error("backend responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Approval endpoints of the governance backend.
#[async_trait]
pub trait ApprovalApi: Send + Sync {
    async fn pending_approvals(&self) -> Result<Vec<ApprovalRecord>, ApiError>;

    async fn create_approval(&self, request: NewApprovalRequest) -> Result<(), ApiError>;

    async fn review_approval(&self, decision: ReviewDecision) -> Result<(), ApiError>;

    /// Most recent approval record for the pair, if any was ever requested.
    async fn latest_approval(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
    ) -> Result<Option<ApprovalRecord>, ApiError>;
}

/// Phase definition and answer endpoints of the governance backend.
#[async_trait]
pub trait QuestionnaireApi: Send + Sync {
    async fn phase(&self, phase_id: &PhaseId) -> Result<Phase, ApiError>;

    async fn answers(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
    ) -> Result<HashMap<QuestionId, String>, ApiError>;

    async fn save_answers(&self, batch: AnswerBatch) -> Result<SaveReceipt, ApiError>;
}
