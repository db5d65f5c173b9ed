use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::domain::answer::AnswerValue;
use crate::domain::phase::{Phase, Question, QuestionId, Section, SectionId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NavigatorError {
    #[error("sections `{first}` and `{second}` share order {order}")]
    DuplicateSectionOrder { order: u32, first: SectionId, second: SectionId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SectionProgress {
    pub section_id: SectionId,
    pub title: String,
    pub answered: usize,
    pub total: usize,
    pub percent: u8,
}

/// Section sequencing and completion progress of one phase.
#[derive(Clone, Debug)]
pub struct PhaseNavigator {
    sections: Vec<Section>,
    current: usize,
}

impl PhaseNavigator {
    pub fn new(phase: &Phase) -> Result<Self, NavigatorError> {
        let mut sections = phase.sections.clone();
        if sections.iter().any(|section| section.order.is_none()) {
            if sections.len() > 1 {
                warn!(
                    event_name = "questionnaire.section_order_missing",
                    phase_id = %phase.id,
                    sections = sections.len(),
                    "sections without an order; keeping delivery order"
                );
            }
            return Ok(Self { sections, current: 0 });
        }

        sections.sort_by_key(|section| section.order);
        let mut seen: HashMap<u32, &SectionId> = HashMap::new();
        for section in &sections {
            let Some(order) = section.order else { continue };
            if let Some(first) = seen.insert(order, &section.id) {
                return Err(NavigatorError::DuplicateSectionOrder {
                    order,
                    first: first.clone(),
                    second: section.id.clone(),
                });
            }
        }

        Ok(Self { sections, current: 0 })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_section(&self) -> Option<&Section> {
        self.sections.get(self.current)
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.sections.len()
    }

    pub fn next(&mut self) -> usize {
        if !self.is_last() {
            self.current += 1;
        }
        self.current
    }

    pub fn previous(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Jumps to `index`, clamped to the last section.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.current = index.min(self.sections.len().saturating_sub(1));
        self.current
    }

    /// Answered questions over all questions of the phase, as a whole percent.
    pub fn progress(&self, answers: &BTreeMap<QuestionId, AnswerValue>) -> u8 {
        let questions = self.sections.iter().flat_map(|section| section.questions.iter());
        let (answered, total) = tally(questions, answers);
        percent(answered, total)
    }

    pub fn section_progress(
        &self,
        answers: &BTreeMap<QuestionId, AnswerValue>,
    ) -> Vec<SectionProgress> {
        self.sections
            .iter()
            .map(|section| {
                let (answered, total) = tally(section.questions.iter(), answers);
                SectionProgress {
                    section_id: section.id.clone(),
                    title: section.title.clone(),
                    answered,
                    total,
                    percent: percent(answered, total),
                }
            })
            .collect()
    }

    /// Required questions with no answer, in navigation order.
    pub fn unanswered_required<'a>(
        &'a self,
        answers: &BTreeMap<QuestionId, AnswerValue>,
    ) -> Vec<&'a Question> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
            .filter(|question| question.required && !is_answered(question, answers))
            .collect()
    }
}

fn is_answered(question: &Question, answers: &BTreeMap<QuestionId, AnswerValue>) -> bool {
    answers.get(&question.id).is_some_and(|value| !value.is_empty())
}

fn tally<'a>(
    questions: impl Iterator<Item = &'a Question>,
    answers: &BTreeMap<QuestionId, AnswerValue>,
) -> (usize, usize) {
    questions.fold((0, 0), |(answered, total), question| {
        (answered + usize::from(is_answered(question, answers)), total + 1)
    })
}

/// Rounds half up; zero questions is 0%.
pub fn percent(answered: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let answered = answered.min(total);
    let rounded = (answered * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{percent, NavigatorError, PhaseNavigator};
    use crate::domain::answer::AnswerValue;
    use crate::domain::phase::{InputType, Phase, PhaseId, Question, QuestionId, Section, SectionId};

    fn question(id: &str, required: bool) -> Question {
        Question {
            id: QuestionId::from(id),
            title: format!("Question {id}"),
            description: None,
            input_type: InputType::Texto,
            required,
            table_config: None,
            table_config_issue: None,
        }
    }

    fn section(id: &str, order: u32, questions: Vec<Question>) -> Section {
        Section {
            id: SectionId(id.to_owned()),
            title: format!("Section {id}"),
            description: None,
            order: Some(order),
            questions,
        }
    }

    fn phase(sections: Vec<Section>) -> Phase {
        Phase {
            id: PhaseId("F-1".to_owned()),
            process_id: None,
            order: 1,
            title: "Context".to_owned(),
            description: None,
            sections,
        }
    }

    fn two_by_three() -> Phase {
        phase(vec![
            section("S-2", 2, vec![question("Q-4", false), question("Q-5", true), question("Q-6", false)]),
            section("S-1", 1, vec![question("Q-1", true), question("Q-2", false), question("Q-3", false)]),
        ])
    }

    fn answered(ids: &[&str]) -> BTreeMap<QuestionId, AnswerValue> {
        ids.iter()
            .map(|id| (QuestionId::from(*id), AnswerValue::Text(format!("answer {id}"))))
            .collect()
    }

    #[test]
    fn progress_counts_only_non_empty_answers() {
        let navigator = PhaseNavigator::new(&two_by_three()).expect("navigator");
        assert_eq!(navigator.progress(&BTreeMap::new()), 0);
        assert_eq!(navigator.progress(&answered(&["Q-1", "Q-2", "Q-4"])), 50);

        let mut blank = answered(&["Q-1"]);
        blank.insert(QuestionId::from("Q-2"), AnswerValue::Text("   ".to_owned()));
        assert_eq!(navigator.progress(&blank), 17);
    }

    #[test]
    fn percent_rounds_half_up_and_stays_in_range() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(6, 6), 100);
        assert_eq!(percent(9, 6), 100);
    }

    #[test]
    fn navigation_follows_section_order_and_clamps() {
        let mut navigator = PhaseNavigator::new(&two_by_three()).expect("navigator");
        assert_eq!(navigator.current_section().map(|section| section.id.0.as_str()), Some("S-1"));
        assert_eq!(navigator.previous(), 0);
        assert_eq!(navigator.next(), 1);
        assert_eq!(navigator.next(), 1);
        assert!(navigator.is_last());
        assert_eq!(navigator.go_to(7), 1);
        assert_eq!(navigator.current_section().map(|section| section.id.0.as_str()), Some("S-2"));
    }

    #[test]
    fn empty_phase_has_no_current_section() {
        let mut navigator = PhaseNavigator::new(&phase(Vec::new())).expect("navigator");
        assert_eq!(navigator.next(), 0);
        assert!(navigator.current_section().is_none());
        assert_eq!(navigator.progress(&answered(&["Q-1"])), 0);
    }

    #[test]
    fn duplicate_section_order_is_rejected() {
        let error = PhaseNavigator::new(&phase(vec![
            section("S-1", 1, Vec::new()),
            section("S-2", 1, Vec::new()),
        ]))
        .expect_err("duplicate order");
        assert_eq!(
            error,
            NavigatorError::DuplicateSectionOrder {
                order: 1,
                first: SectionId("S-1".to_owned()),
                second: SectionId("S-2".to_owned()),
            }
        );
    }

    #[test]
    fn sections_without_order_keep_delivery_order() {
        let phase: Phase = serde_json::from_value(serde_json::json!({
            "idPhase": "F-1",
            "title": "Context",
            "sections": [
                { "idSection": "S-2", "title": "Scope", "questions": [] },
                { "idSection": "S-1", "title": "Owners", "questions": [] }
            ]
        }))
        .expect("phase fixture");

        let mut navigator = PhaseNavigator::new(&phase).expect("navigator");
        assert_eq!(navigator.section_count(), 2);
        assert_eq!(navigator.current_section().map(|section| section.id.0.as_str()), Some("S-2"));
        assert_eq!(navigator.next(), 1);
        assert_eq!(navigator.current_section().map(|section| section.id.0.as_str()), Some("S-1"));
    }

    #[test]
    fn section_progress_and_required_gaps() {
        let navigator = PhaseNavigator::new(&two_by_three()).expect("navigator");
        let answers = answered(&["Q-1", "Q-2", "Q-3"]);

        let sections = navigator.section_progress(&answers);
        assert_eq!(sections[0].percent, 100);
        assert_eq!((sections[1].answered, sections[1].total, sections[1].percent), (0, 3, 0));

        let missing: Vec<&str> = navigator
            .unanswered_required(&answers)
            .into_iter()
            .map(|question| question.id.as_str())
            .collect();
        assert_eq!(missing, vec!["Q-5"]);
    }
}
