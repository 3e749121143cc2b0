//! Turns the answer store into the final submission payload.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use exam_core::AnswerStore;
use exam_core::model::{
    AnswerKind, AnswerState, LearnerId, ModuleCatalog, ModuleId, NO_ANSWER, SubmissionRecord,
};

/// Separator between accepted alternatives of a free-response answer.
pub const ALTERNATIVE_SEPARATOR: char = '|';

/// Builds one `SubmissionRecord` per answer entry, in order of first visit.
#[derive(Debug, Clone)]
pub struct SubmissionAssembler {
    catalog: Arc<ModuleCatalog>,
}

impl SubmissionAssembler {
    #[must_use]
    pub fn new(catalog: Arc<ModuleCatalog>) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn build(
        &self,
        flow: &[ModuleId],
        answers: &AnswerStore,
        learner: &LearnerId,
        timestamp: DateTime<Utc>,
    ) -> Vec<SubmissionRecord> {
        answers
            .iter()
            .map(|state| {
                let student_answer = student_answer(state);
                let is_correct = is_correct(state, &student_answer);
                SubmissionRecord {
                    timestamp,
                    student_id: learner.as_str().to_string(),
                    quiz_name: self.quiz_name(flow, state.key().module_index()),
                    question_id: state.question_id().as_str().to_string(),
                    student_answer,
                    is_correct,
                    time_spent_seconds: round_to_hundredths(state.time_spent_secs()),
                }
            })
            .collect()
    }

    fn quiz_name(&self, flow: &[ModuleId], module_index: usize) -> String {
        match flow.get(module_index) {
            Some(module) => self.catalog.resolve(module).quiz_name().to_string(),
            None => {
                warn!(module_index, "answer entry outside the test flow");
                format!("module-{}", module_index + 1)
            }
        }
    }
}

/// The learner's answer as submitted: trimmed free text, the chosen letter,
/// or `NO_ANSWER`.
#[must_use]
pub fn student_answer(state: &AnswerState) -> String {
    let answer = match state.snapshot().kind() {
        AnswerKind::FreeResponse => state.spr_answer().map(str::trim),
        AnswerKind::MultipleChoice { .. } => state.selected_choice().map(|letter| letter.as_str()),
        AnswerKind::Unresolved => None,
    };
    match answer {
        Some(answer) if !answer.is_empty() => answer.to_string(),
        _ => NO_ANSWER.to_string(),
    }
}

/// Literal comparison against the expected answer captured at first visit.
#[must_use]
pub fn is_correct(state: &AnswerState, student_answer: &str) -> bool {
    if student_answer == NO_ANSWER {
        return false;
    }
    let Some(expected) = state.snapshot().expected_answer() else {
        return false;
    };
    match state.snapshot().kind() {
        AnswerKind::FreeResponse => expected
            .split(ALTERNATIVE_SEPARATOR)
            .map(str::trim)
            .any(|alternative| !alternative.is_empty() && alternative == student_answer),
        AnswerKind::MultipleChoice { .. } => expected.trim() == student_answer,
        AnswerKind::Unresolved => false,
    }
}

fn round_to_hundredths(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerKey, OptionLetter, QuestionRecord};
    use exam_core::time::fixed_now;

    fn learner() -> LearnerId {
        LearnerId::parse("student@example.com").unwrap()
    }

    fn assembler() -> SubmissionAssembler {
        SubmissionAssembler::new(Arc::new(ModuleCatalog::builtin()))
    }

    #[test]
    fn free_response_matches_any_alternative_after_trim() {
        let mut store = AnswerStore::new();
        let question = QuestionRecord::free_response("s1", "Solve", "3.5 | 7/2");
        let key = AnswerKey::new(0, 1);
        store.get_or_insert(key, Some(&question));

        for (typed, expected) in [(" 7/2 ", true), ("3.5", true), ("3.50", false), ("", false)] {
            store.set_free_response(key, typed).unwrap();
            let state = store.get(key).unwrap();
            let answer = student_answer(state);
            assert_eq!(is_correct(state, &answer), expected, "{typed:?}");
        }
    }

    #[test]
    fn choice_comparison_is_case_sensitive() {
        let mut store = AnswerStore::new();
        let key = AnswerKey::new(0, 1);
        let lower = QuestionRecord::multiple_choice("q1", "Pick", &["1", "2"], "b");
        store.get_or_insert(key, Some(&lower));
        store.set_choice(key, OptionLetter::B).unwrap();

        let state = store.get(key).unwrap();
        assert_eq!(student_answer(state), "B");
        assert!(!is_correct(state, "B"));
    }

    #[test]
    fn records_follow_first_visit_order_and_round_time() {
        let mut store = AnswerStore::new();
        let q1 = QuestionRecord::multiple_choice("q1", "Pick", &["1", "2"], "A");
        let q2 = QuestionRecord::multiple_choice("q2", "Pick", &["1", "2"], "A");
        store.get_or_insert(AnswerKey::new(0, 2), Some(&q2));
        store.get_or_insert(AnswerKey::new(0, 1), Some(&q1));
        store.record_time(AnswerKey::new(0, 2), 1.005_1);
        store.record_time(AnswerKey::new(0, 1), 12.344);

        let records = assembler().build(
            &[ModuleId::new("DT-T0-RW-M1")],
            &store,
            &learner(),
            fixed_now(),
        );

        let ids: Vec<_> = records.iter().map(|r| r.question_id.as_str()).collect();
        assert_eq!(ids, ["q2", "q1"]);
        assert!((records[0].time_spent_seconds - 1.01).abs() < 1e-9);
        assert!((records[1].time_spent_seconds - 12.34).abs() < 1e-9);
        assert!(records.iter().all(|r| r.quiz_name == "DT-T0-RW-M1"));
        assert!(records.iter().all(|r| r.is_unanswered() && !r.is_correct));
        assert_eq!(records[0].student_id, "student@example.com");
    }

    #[test]
    fn fallback_entries_are_submitted_unanswered() {
        let mut store = AnswerStore::new();
        store.get_or_insert(AnswerKey::new(4, 1), None);

        let records = assembler().build(&[ModuleId::new("M1")], &store, &learner(), fixed_now());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question_id, "unresolved-m4-q1");
        assert_eq!(records[0].quiz_name, "module-5");
        assert!(records[0].is_unanswered());
    }
}
