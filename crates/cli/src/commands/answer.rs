use std::sync::Arc;

use govflow_client::HttpBackend;
use govflow_core::answers::{saved_notice, AnswerDraftStore, DraftError};
use govflow_core::approvals::{ApprovalError, ApprovalWorkflow, PhaseTarget, ViewMode};
use govflow_core::backend::{ApiError, QuestionnaireApi};
use govflow_core::domain::phase::{InputType, PhaseId, QuestionId};
use govflow_core::domain::process::ProcessId;
use govflow_core::errors::{ApplicationError, DomainError};
use govflow_core::questionnaire::{EditError, PhaseNavigator, QuestionRenderer};
use govflow_core::session::Capability;
use serde::Serialize;
use serde_json::json;

use crate::commands::context::CommandContext;
use crate::commands::CommandResult;

const COMMAND: &str = "answer";

/// One answer edit. Table questions address a single cell; missing rows are
/// added up to the table's row limit.
#[derive(Clone, Debug)]
pub struct AnswerEdit {
    pub process_id: String,
    pub phase_id: String,
    pub question_id: String,
    pub value: String,
    pub row: Option<usize>,
    pub column: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Saved {
    question_id: QuestionId,
    saved: usize,
    progress: u8,
}

struct Failed {
    error: ApplicationError,
    message: String,
}

impl From<ApiError> for Failed {
    fn from(value: ApiError) -> Self {
        let message = if value.is_unauthorized() {
            "Your session has expired. Please sign in again.".to_owned()
        } else {
            format!("The questionnaire could not be loaded: {value}")
        };
        Self { error: value.into(), message }
    }
}

impl From<ApprovalError> for Failed {
    fn from(value: ApprovalError) -> Self {
        Self { message: value.user_message(), error: value.into() }
    }
}

impl From<EditError> for Failed {
    fn from(value: EditError) -> Self {
        Self { message: value.notice().message, error: DomainError::from(value).into() }
    }
}

impl From<DraftError> for Failed {
    fn from(value: DraftError) -> Self {
        Self { message: value.user_message(), error: value.into() }
    }
}

fn invalid(message: String) -> Failed {
    Failed { error: DomainError::Validation(message.clone()).into(), message }
}

pub fn run(edit: AnswerEdit) -> CommandResult {
    match run_edit(edit) {
        Ok(result) | Err(result) => result,
    }
}

fn run_edit(edit: AnswerEdit) -> Result<CommandResult, CommandResult> {
    let mut context = CommandContext::open(COMMAND)?;
    context.actor_with(Capability::EditAnswers)?;
    let mode = context.session()?.default_view_mode();
    let backend = context.backend()?;

    let saved = match context.block_on(apply(backend, mode, edit))? {
        Ok(saved) => saved,
        Err(failed) => return Err(context.fail(failed.error, failed.message)),
    };

    let message = saved_notice(saved.saved).message;
    Ok(CommandResult::success_with_data(COMMAND, message, Some(json!(saved))))
}

async fn apply(
    backend: Arc<HttpBackend>,
    mode: ViewMode,
    edit: AnswerEdit,
) -> Result<Saved, Failed> {
    let process_id = ProcessId(edit.process_id.trim().to_owned());
    let phase = backend.phase(&PhaseId(edit.phase_id.trim().to_owned())).await?;
    let question_id = QuestionId::from(edit.question_id.trim());
    let Some(question) = phase.question(&question_id) else {
        return Err(invalid(format!("phase `{}` has no question `{question_id}`", phase.id)));
    };

    let navigator = PhaseNavigator::new(&phase)
        .map_err(|error| invalid(format!("phase `{}` is misconfigured: {error}", phase.id)))?;

    let target = PhaseTarget::for_phase(process_id.clone(), &phase);
    let workflow = ApprovalWorkflow::load(backend.clone(), target, mode).await?;
    let mut store = AnswerDraftStore::load(backend, process_id, &phase).await;
    let renderer = QuestionRenderer::new(workflow.can_edit());

    match question.input_type {
        InputType::Texto => renderer.update_text(&mut store, question, edit.value)?,
        InputType::Date => renderer.update_date(&mut store, question, &edit.value)?,
        InputType::Tabla => {
            let (Some(row), Some(column)) = (edit.row, edit.column) else {
                return Err(invalid("table answers need --row and --column".to_owned()));
            };
            let value = edit.value;
            renderer.edit_table(&mut store, question, |table| {
                while table.row_count() <= row && table.add_row() {}
                table.update_cell(row, column, value)
            })?;
        }
    }

    let saved = store.flush().await?;
    Ok(Saved { question_id, saved, progress: navigator.progress(store.answers()) })
}
