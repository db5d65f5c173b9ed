use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::answers::AnswerDraftStore;
use crate::approvals::WorkflowState;
use crate::backend::{ApprovalApi, QuestionnaireApi};
use crate::domain::answer::{rich_text_plain, AnswerValue};
use crate::domain::approval::ApprovalRecord;
use crate::domain::phase::{ColumnDef, Phase, PhaseId, Question, QuestionId};
use crate::domain::process::ProcessId;
use crate::errors::{ApplicationError, DomainError};
use crate::questionnaire::{PhaseNavigator, SectionProgress};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApprovalSummary {
    pub status: WorkflowState,
    pub requested_by: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl ApprovalSummary {
    pub fn from_latest(latest: Option<&ApprovalRecord>) -> Self {
        Self {
            status: WorkflowState::from_latest(latest),
            requested_by: latest.map(|record| record.requested_by.clone()),
            requested_at: latest.and_then(|record| record.requested_at),
            reviewed_by: latest.and_then(|record| record.reviewed_by.clone()),
            reviewed_at: latest.and_then(|record| record.reviewed_at),
            rejection_reason: latest.and_then(|record| record.rejection_reason.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionReport {
    pub question_id: QuestionId,
    pub title: String,
    pub required: bool,
    pub answered: bool,
    pub lines: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub title: String,
    pub progress: SectionProgress,
    pub questions: Vec<QuestionReport>,
}

/// Printable summary of one phase of a process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub process_id: ProcessId,
    pub phase_id: PhaseId,
    pub phase_order: u32,
    pub phase_title: String,
    pub approval: ApprovalSummary,
    pub progress: u8,
    pub sections: Vec<SectionReport>,
    pub generated_at: DateTime<Utc>,
}

impl PhaseReport {
    pub fn build(
        process_id: ProcessId,
        phase: &Phase,
        answers: &BTreeMap<QuestionId, AnswerValue>,
        latest: Option<&ApprovalRecord>,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let navigator = PhaseNavigator::new(phase)
            .map_err(|error| DomainError::InvariantViolation(error.to_string()))?;

        let sections = navigator
            .sections()
            .iter()
            .zip(navigator.section_progress(answers))
            .map(|(section, progress)| SectionReport {
                title: section.title.clone(),
                progress,
                questions: section
                    .questions
                    .iter()
                    .map(|question| question_report(question, answers.get(&question.id)))
                    .collect(),
            })
            .collect();

        Ok(Self {
            process_id,
            phase_id: phase.id.clone(),
            phase_order: phase.order,
            phase_title: phase.title.clone(),
            approval: ApprovalSummary::from_latest(latest),
            progress: navigator.progress(answers),
            sections,
            generated_at,
        })
    }

    /// Fetches the phase, its answers, and the latest approval. A missing
    /// phase definition fails the report; unreadable answers leave it empty.
    pub async fn collect(
        questionnaire: Arc<dyn QuestionnaireApi>,
        approvals: &dyn ApprovalApi,
        process_id: ProcessId,
        phase_id: &PhaseId,
    ) -> Result<Self, ApplicationError> {
        let phase = questionnaire.phase(phase_id).await?;
        let latest = approvals.latest_approval(&process_id, phase_id).await?;
        let store = AnswerDraftStore::load(questionnaire, process_id.clone(), &phase).await;

        let report =
            Self::build(process_id, &phase, store.answers(), latest.as_ref(), Utc::now())?;
        info!(
            event_name = "report.built",
            process_id = %report.process_id,
            phase_id = %report.phase_id,
            progress = report.progress,
            "phase report assembled"
        );
        Ok(report)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Phase {}: {}", self.phase_order, self.phase_title);
        let _ = writeln!(out, "Process: {}", self.process_id);
        let _ = writeln!(out, "Approval: {:?}", self.approval.status);
        if let Some(reason) = &self.approval.rejection_reason {
            let _ = writeln!(out, "Rejection reason: {reason}");
        }
        let _ = writeln!(out, "Progress: {}%", self.progress);

        for section in &self.sections {
            let _ = writeln!(out, "\n## {} ({}%)", section.title, section.progress.percent);
            for question in &section.questions {
                let marker = if question.required { " *" } else { "" };
                let _ = writeln!(out, "- {}{}", question.title, marker);
                if question.lines.is_empty() {
                    let _ = writeln!(out, "    (no answer)");
                }
                for line in &question.lines {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }
        out
    }
}

fn question_report(question: &Question, value: Option<&AnswerValue>) -> QuestionReport {
    let lines = match value {
        None => Vec::new(),
        Some(value) if value.is_empty() => Vec::new(),
        Some(AnswerValue::Text(payload)) => {
            rich_text_plain(payload).lines().map(str::to_owned).collect()
        }
        Some(AnswerValue::Date(date)) => vec![date.trim().to_owned()],
        Some(AnswerValue::Table(rows)) => {
            let columns = question.table_config().map(|config| config.columns.as_slice()).ok();
            table_lines(columns.unwrap_or_default(), rows)
        }
    };

    QuestionReport {
        question_id: question.id.clone(),
        title: question.title.clone(),
        required: question.required,
        answered: !lines.is_empty(),
        lines,
    }
}

/// One line per non-blank row, as `header: value` pairs.
fn table_lines(columns: &[ColumnDef], rows: &[Vec<String>]) -> Vec<String> {
    rows.iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(index, cell)| {
                    let header = columns
                        .get(index)
                        .map(|column| column.header.clone())
                        .unwrap_or_else(|| format!("Column {}", index + 1));
                    format!("{header}: {cell}")
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Utc;

    use super::PhaseReport;
    use crate::approvals::WorkflowState;
    use crate::backend::{ApiError, ApprovalApi, InMemoryBackend};
    use crate::domain::answer::AnswerValue;
    use crate::domain::approval::NewApprovalRequest;
    use crate::domain::phase::{Phase, PhaseId, QuestionId};
    use crate::domain::process::ProcessId;
    use crate::errors::ApplicationError;

    fn phase() -> Phase {
        serde_json::from_str(
            r#"{
                "idPhase": "F-1",
                "phaseOrder": 2,
                "title": "Risk assessment",
                "sections": [{
                    "idSection": "S-1",
                    "title": "Inventory",
                    "order": 1,
                    "questions": [
                        {"idQuestion": "Q-1", "title": "Scope", "inputType": "TEXTO", "required": true},
                        {"idQuestion": "Q-2", "title": "Kickoff", "inputType": "DATE"},
                        {"idQuestion": "Q-3", "title": "Assets", "inputType": "TABLA",
                         "tableConfig": {"columns": [{"key": "name", "header": "Name"}, {"key": "owner", "header": "Owner"}]}}
                    ]
                }]
            }"#,
        )
        .expect("phase fixture")
    }

    #[test]
    fn tables_render_as_header_value_pairs() {
        let mut answers = BTreeMap::new();
        answers.insert(
            QuestionId::from("Q-3"),
            AnswerValue::Table(vec![
                vec!["db".to_owned(), "ana".to_owned()],
                vec![String::new(), " ".to_owned()],
            ]),
        );
        answers.insert(
            QuestionId::from("Q-1"),
            AnswerValue::Text(r#"{"blocks":[{"type":"paragraph","data":{"text":"Core banking"}}]}"#.to_owned()),
        );

        let report = PhaseReport::build(ProcessId("P-1".to_owned()), &phase(), &answers, None, Utc::now())
            .expect("report");
        let questions = &report.sections[0].questions;

        assert_eq!(report.progress, 67);
        assert_eq!(report.approval.status, WorkflowState::None);
        assert_eq!(questions[0].lines, vec!["Core banking".to_owned()]);
        assert!(!questions[1].answered);
        assert_eq!(questions[2].lines, vec!["Name: db, Owner: ana".to_owned()]);

        let text = report.render_text();
        assert!(text.contains("Phase 2: Risk assessment"));
        assert!(text.contains("    (no answer)"));
    }

    #[test]
    fn sections_without_order_still_report() {
        let phase: Phase = serde_json::from_str(
            r#"{
                "idPhase": "F-1",
                "title": "Risk assessment",
                "sections": [
                    {"idSection": "S-1", "title": "Inventory",
                     "questions": [{"idQuestion": "Q-1", "title": "Scope", "inputType": "TEXTO"}]},
                    {"idSection": "S-2", "title": "Owners",
                     "questions": [{"idQuestion": "Q-2", "title": "Lead", "inputType": "TEXTO"}]}
                ]
            }"#,
        )
        .expect("phase fixture");
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::from("Q-2"), AnswerValue::Text("ana".to_owned()));

        let report = PhaseReport::build(ProcessId("P-1".to_owned()), &phase, &answers, None, Utc::now())
            .expect("report");

        assert_eq!(report.progress, 50);
        let titles: Vec<&str> = report.sections.iter().map(|section| section.title.as_str()).collect();
        assert_eq!(titles, vec!["Inventory", "Owners"]);
    }

    #[tokio::test]
    async fn collect_reads_answers_and_latest_approval() {
        let backend = Arc::new(InMemoryBackend::default());
        let process = ProcessId("P-1".to_owned());
        let phase_id = PhaseId("F-1".to_owned());
        backend.insert_phase(phase()).await;
        backend.insert_raw_answer(&process, &phase_id, "Q-2".into(), "2026-03-01").await;
        backend
            .create_approval(NewApprovalRequest {
                process_id: process.clone(),
                phase_id: phase_id.clone(),
                phase_order: 2,
                phase_title: "Risk assessment".to_owned(),
                requested_by: "ana".to_owned(),
                comments: None,
            })
            .await
            .expect("seed approval");

        let report = PhaseReport::collect(backend.clone(), backend.as_ref(), process, &phase_id)
            .await
            .expect("report");

        assert_eq!(report.approval.status, WorkflowState::Pending);
        assert_eq!(report.approval.requested_by.as_deref(), Some("ana"));
        assert_eq!(report.sections[0].questions[1].lines, vec!["2026-03-01".to_owned()]);
        assert_eq!(report.progress, 33);
    }

    #[tokio::test]
    async fn missing_phase_fails_the_report() {
        let backend = Arc::new(InMemoryBackend::default());
        let error = PhaseReport::collect(
            backend.clone(),
            backend.as_ref(),
            ProcessId("P-1".to_owned()),
            &PhaseId("F-404".to_owned()),
        )
        .await
        .expect_err("unknown phase");

        assert!(matches!(error, ApplicationError::Backend(ApiError::Status { status: 404, .. })));
    }
}
