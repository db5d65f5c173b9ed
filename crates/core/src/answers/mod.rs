use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{ApiError, QuestionnaireApi};
use crate::domain::answer::{AnswerBatch, AnswerEntry, AnswerValue};
use crate::domain::phase::{Phase, PhaseId, QuestionId};
use crate::domain::process::ProcessId;
use crate::errors::{ApplicationError, DomainError, Notice};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("save already in progress")]
    Busy,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Backend(#[from] ApiError),
}

impl DraftError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Busy => "A save is already in progress.".to_owned(),
            Self::Validation(message) => message.clone(),
            Self::Backend(ApiError::Unauthorized) => {
                "Your session has expired. Please sign in again.".to_owned()
            }
            Self::Backend(_) => {
                "Your answers could not be saved. Your changes are kept; please retry.".to_owned()
            }
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error(self.user_message())
    }
}

impl From<DraftError> for ApplicationError {
    fn from(value: DraftError) -> Self {
        match value {
            DraftError::Busy => Self::Busy(DraftError::Busy.to_string()),
            DraftError::Validation(message) => DomainError::Validation(message).into(),
            DraftError::Backend(error) => Self::Backend(error),
        }
    }
}

pub fn saved_notice(saved_count: usize) -> Notice {
    Notice::success(format!("{saved_count} answers saved."))
}

/// Clears the in-flight flag when the flush finishes or its future is dropped.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, DraftError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DraftError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Unsaved answers of one phase in one process.
///
/// `set` is a plain in-memory write. `flush` borrows the store shared, so
/// edits cannot interleave with a save, and at most one flush runs at a time.
pub struct AnswerDraftStore {
    api: Arc<dyn QuestionnaireApi>,
    process_id: ProcessId,
    phase_id: PhaseId,
    drafts: BTreeMap<QuestionId, AnswerValue>,
    dirty: AtomicBool,
    in_flight: AtomicBool,
}

impl AnswerDraftStore {
    pub fn new(api: Arc<dyn QuestionnaireApi>, process_id: ProcessId, phase_id: PhaseId) -> Self {
        Self {
            api,
            process_id,
            phase_id,
            drafts: BTreeMap::new(),
            dirty: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Fetches persisted answers and decodes each by its question's input
    /// type. Any load failure leaves the store empty.
    pub async fn load(api: Arc<dyn QuestionnaireApi>, process_id: ProcessId, phase: &Phase) -> Self {
        let mut store = Self::new(api, process_id, phase.id.clone());
        if store.process_id.is_blank() || store.phase_id.is_blank() {
            warn!(
                event_name = "answers.load_skipped",
                process_id = %store.process_id,
                phase_id = %store.phase_id,
                "blank identifiers; starting with no answers"
            );
            return store;
        }

        let persisted = match store.api.answers(&store.process_id, &store.phase_id).await {
            Ok(persisted) => persisted,
            Err(error) => {
                warn!(
                    event_name = "answers.load_failed",
                    process_id = %store.process_id,
                    phase_id = %store.phase_id,
                    error = %error,
                    "could not load persisted answers; starting empty"
                );
                return store;
            }
        };

        for (question_id, raw) in persisted {
            let value = match phase.question(&question_id) {
                Some(question) => AnswerValue::decode(question.input_type, &raw),
                None => AnswerValue::Text(raw),
            };
            store.drafts.insert(question_id, value);
        }
        info!(
            event_name = "answers.loaded",
            process_id = %store.process_id,
            phase_id = %store.phase_id,
            count = store.drafts.len(),
            "persisted answers loaded"
        );
        store
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    pub fn phase_id(&self) -> &PhaseId {
        &self.phase_id
    }

    pub fn set(&mut self, question_id: QuestionId, value: AnswerValue) {
        self.drafts.insert(question_id, value);
        *self.dirty.get_mut() = true;
    }

    pub fn get(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.drafts.get(question_id)
    }

    pub fn answers(&self) -> &BTreeMap<QuestionId, AnswerValue> {
        &self.drafts
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn is_flushing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submits every draft as one batch, ordered by question id. Drafts are
    /// kept whatever the outcome.
    pub async fn flush(&self) -> Result<usize, DraftError> {
        if self.process_id.is_blank() || self.phase_id.is_blank() {
            return Err(DraftError::Validation(
                "process and phase identifiers are required to save answers".to_owned(),
            ));
        }
        let _guard = FlushGuard::acquire(&self.in_flight)?;

        let batch = AnswerBatch {
            process_id: self.process_id.clone(),
            phase_id: self.phase_id.clone(),
            answers: self
                .drafts
                .iter()
                .map(|(question_id, value)| AnswerEntry {
                    question_id: question_id.clone(),
                    answer_value: value.encode(),
                })
                .collect(),
        };
        let submitted = batch.answers.len();

        match self.api.save_answers(batch).await {
            Ok(receipt) => {
                self.dirty.store(false, Ordering::Release);
                info!(
                    event_name = "answers.flushed",
                    process_id = %self.process_id,
                    phase_id = %self.phase_id,
                    submitted,
                    saved_count = receipt.saved_count,
                    "answer drafts saved"
                );
                Ok(receipt.saved_count)
            }
            Err(error) => {
                warn!(
                    event_name = "answers.flush_failed",
                    process_id = %self.process_id,
                    phase_id = %self.phase_id,
                    error = %error,
                    "saving answers failed; drafts kept"
                );
                Err(error.into())
            }
        }
    }
}
