pub mod answers;
pub mod approvals;
pub mod backend;
pub mod config;
pub mod domain;
pub mod errors;
pub mod questionnaire;
pub mod report;
pub mod session;

pub use answers::{AnswerDraftStore, DraftError};
pub use approvals::{
    can_edit, ApprovalError, ApprovalEvent, ApprovalWorkflow, PhaseTarget, ReviewQueue,
    TransitionOutcome, ViewMode, WorkflowState,
};
pub use backend::{ApiError, ApprovalApi, InMemoryBackend, QuestionnaireApi};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::answer::AnswerValue;
pub use domain::approval::{ApprovalId, ApprovalRecord, ApprovalStatus};
pub use domain::phase::{InputType, Phase, PhaseId, Question, QuestionId, TableConfig};
pub use domain::process::{Process, ProcessId, ProcessStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError, Notice, NoticeLevel};
pub use questionnaire::{
    EditError, EditingSurface, NavigatorError, PhaseNavigator, QuestionRenderer, TableEditor,
    TableError,
};
pub use report::PhaseReport;
pub use session::{Actor, AppContext, Role, Session, SessionTimer};
