use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::answers::AnswerDraftStore;
use crate::domain::answer::AnswerValue;
use crate::domain::phase::{InputType, Question, QuestionId, TableConfigError};
use crate::errors::{DomainError, Notice};
use crate::questionnaire::table::{TableEditor, TableError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("question `{0}` is read-only")]
    ReadOnly(QuestionId),
    #[error("question `{question_id}` expects {expected:?} input, not {attempted:?}")]
    WrongInputType { question_id: QuestionId, expected: InputType, attempted: InputType },
    #[error("`{0}` is not a YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("question `{question_id}` has an unusable table configuration: {issue}")]
    Misconfigured { question_id: QuestionId, issue: TableConfigError },
    #[error(transparent)]
    Table(#[from] TableError),
}

impl EditError {
    pub fn notice(&self) -> Notice {
        Notice::error(self.to_string())
    }
}

impl From<EditError> for DomainError {
    fn from(value: EditError) -> Self {
        Self::Validation(value.to_string())
    }
}

/// How a question is presented for editing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditingSurface {
    RichText { payload: String },
    Date { value: Option<NaiveDate>, raw: String },
    Table(TableEditor),
    Misconfigured { issue: TableConfigError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedQuestion {
    pub question_id: QuestionId,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub answered: bool,
    pub read_only: bool,
    pub surface: EditingSurface,
}

/// Maps a question and its draft to an editing surface, and writes edits
/// back to the draft store when editing is allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuestionRenderer {
    editable: bool,
}

impl QuestionRenderer {
    pub fn new(editable: bool) -> Self {
        Self { editable }
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn render(&self, question: &Question, store: &AnswerDraftStore) -> RenderedQuestion {
        let value = store.get(&question.id);
        let surface = match question.input_type {
            InputType::Texto => {
                let payload = match value {
                    Some(AnswerValue::Text(payload) | AnswerValue::Date(payload)) => payload.clone(),
                    Some(table @ AnswerValue::Table(_)) => table.encode(),
                    None => String::new(),
                };
                EditingSurface::RichText { payload }
            }
            InputType::Date => {
                let raw = match value {
                    Some(AnswerValue::Date(raw) | AnswerValue::Text(raw)) => raw.trim().to_owned(),
                    Some(AnswerValue::Table(_)) | None => String::new(),
                };
                EditingSurface::Date { value: parse_date(&raw).ok().flatten(), raw }
            }
            InputType::Tabla => match question.table_config() {
                Ok(config) => {
                    let rows = value.and_then(AnswerValue::as_table).unwrap_or_default();
                    EditingSurface::Table(TableEditor::new(config, rows, !self.editable))
                }
                Err(issue) => EditingSurface::Misconfigured { issue },
            },
        };

        // A table answer that did not decode as rows stays as text and is
        // not counted as an answer to the table.
        let answered = match question.input_type {
            InputType::Tabla => {
                value.is_some_and(|value| value.as_table().is_some() && !value.is_empty())
            }
            InputType::Texto | InputType::Date => value.is_some_and(|value| !value.is_empty()),
        };

        RenderedQuestion {
            question_id: question.id.clone(),
            title: question.title.clone(),
            description: question.description.clone(),
            required: question.required,
            answered,
            read_only: !self.editable,
            surface,
        }
    }

    pub fn update_text(
        &self,
        store: &mut AnswerDraftStore,
        question: &Question,
        payload: impl Into<String>,
    ) -> Result<(), EditError> {
        self.check(question, InputType::Texto)?;
        store.set(question.id.clone(), AnswerValue::Text(payload.into()));
        Ok(())
    }

    /// An empty string clears the date.
    pub fn update_date(
        &self,
        store: &mut AnswerDraftStore,
        question: &Question,
        raw: &str,
    ) -> Result<(), EditError> {
        self.check(question, InputType::Date)?;
        let date = parse_date(raw)?;
        let value = date.map(|date| date.format("%Y-%m-%d").to_string()).unwrap_or_default();
        store.set(question.id.clone(), AnswerValue::Date(value));
        Ok(())
    }

    /// Applies `edit` to the question's table and stores the result when the
    /// edit reports a change.
    pub fn edit_table<F>(
        &self,
        store: &mut AnswerDraftStore,
        question: &Question,
        edit: F,
    ) -> Result<bool, EditError>
    where
        F: FnOnce(&mut TableEditor) -> Result<bool, TableError>,
    {
        self.check(question, InputType::Tabla)?;
        let config = question.table_config().map_err(|issue| EditError::Misconfigured {
            question_id: question.id.clone(),
            issue,
        })?;

        let existing = store.get(&question.id);
        let replaces_text =
            existing.is_some_and(|value| value.as_table().is_none() && !value.is_empty());
        let rows = existing.and_then(AnswerValue::as_table).unwrap_or_default();
        let mut editor = TableEditor::new(config, rows, false);
        if !edit(&mut editor)? {
            return Ok(false);
        }

        if replaces_text {
            warn!(
                event_name = "questionnaire.table_value_replaced",
                question_id = %question.id,
                "stored answer was not a table; replacing it with the edited rows"
            );
        }

        debug!(
            event_name = "questionnaire.table_edited",
            question_id = %question.id,
            rows = editor.row_count(),
            "table answer updated"
        );
        store.set(question.id.clone(), editor.into_value());
        Ok(true)
    }

    fn check(&self, question: &Question, attempted: InputType) -> Result<(), EditError> {
        if question.input_type != attempted {
            return Err(EditError::WrongInputType {
                question_id: question.id.clone(),
                expected: question.input_type,
                attempted,
            });
        }
        if !self.editable {
            return Err(EditError::ReadOnly(question.id.clone()));
        }
        Ok(())
    }
}

fn parse_date(raw: &str) -> Result<Option<NaiveDate>, EditError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| EditError::InvalidDate(trimmed.to_owned()))
}
