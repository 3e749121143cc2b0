use std::collections::BTreeSet;

use thiserror::Error;

use crate::model::ids::{AnswerKey, QuestionId};
use crate::model::question::{OptionLetter, QuestionKind, QuestionRecord};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {0} is not multiple choice")]
    NotMultipleChoice(QuestionId),

    #[error("question {0} does not take a free response")]
    NotFreeResponse(QuestionId),

    #[error("question {question} has no option {letter}")]
    UnknownOption {
        question: QuestionId,
        letter: OptionLetter,
    },

    #[error("answer entry for {0} has no source question")]
    Unresolved(AnswerKey),
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Answer variant captured from the question at first access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKind {
    MultipleChoice { letters: Vec<OptionLetter> },
    FreeResponse,
    /// Fallback entry created without a loaded question.
    Unresolved,
}

/// Identifying and grading fields copied from a `QuestionRecord`, so the entry
/// stays gradable after the module's questions are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSnapshot {
    question_id: QuestionId,
    expected_answer: Option<String>,
    kind: AnswerKind,
}

impl AnswerSnapshot {
    #[must_use]
    pub fn from_question(question: &QuestionRecord) -> Self {
        let kind = match question.kind() {
            QuestionKind::MultipleChoice { .. } => AnswerKind::MultipleChoice {
                letters: question.kind().letters(),
            },
            QuestionKind::FreeResponse => AnswerKind::FreeResponse,
        };
        Self {
            question_id: question.id().clone(),
            expected_answer: Some(question.expected_answer().to_string()),
            kind,
        }
    }

    /// Synthesized snapshot for an entry whose question is not in memory.
    #[must_use]
    pub fn fallback(key: AnswerKey) -> Self {
        Self {
            question_id: QuestionId::new(format!(
                "unresolved-m{}-q{}",
                key.module_index(),
                key.position()
            )),
            expected_answer: None,
            kind: AnswerKind::Unresolved,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn expected_answer(&self) -> Option<&str> {
        self.expected_answer.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> &AnswerKind {
        &self.kind
    }
}

//
// ─── ANSWER STATE ──────────────────────────────────────────────────────────────
//

/// The learner's response. A choice and a free-text entry are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Choice(OptionLetter),
    FreeText(String),
}

/// Per-question answer, flag and time-on-task state.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerState {
    key: AnswerKey,
    snapshot: AnswerSnapshot,
    response: Option<Response>,
    marked: bool,
    crossed_out: BTreeSet<OptionLetter>,
    time_spent_secs: f64,
}

impl AnswerState {
    #[must_use]
    pub fn new(key: AnswerKey, snapshot: AnswerSnapshot) -> Self {
        Self {
            key,
            snapshot,
            response: None,
            marked: false,
            crossed_out: BTreeSet::new(),
            time_spent_secs: 0.0,
        }
    }

    #[must_use]
    pub fn key(&self) -> AnswerKey {
        self.key
    }

    #[must_use]
    pub fn snapshot(&self) -> &AnswerSnapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        self.snapshot.question_id()
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self.snapshot.kind, AnswerKind::Unresolved)
    }

    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    #[must_use]
    pub fn selected_choice(&self) -> Option<OptionLetter> {
        match self.response {
            Some(Response::Choice(letter)) => Some(letter),
            _ => None,
        }
    }

    #[must_use]
    pub fn spr_answer(&self) -> Option<&str> {
        match &self.response {
            Some(Response::FreeText(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// True when a choice is selected or a non-blank free response is entered.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match &self.response {
            Some(Response::Choice(_)) => true,
            Some(Response::FreeText(text)) => !text.trim().is_empty(),
            None => false,
        }
    }

    #[must_use]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    #[must_use]
    pub fn crossed_out(&self) -> &BTreeSet<OptionLetter> {
        &self.crossed_out
    }

    #[must_use]
    pub fn is_crossed_out(&self, letter: OptionLetter) -> bool {
        self.crossed_out.contains(&letter)
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> f64 {
        self.time_spent_secs
    }

    /// Select an option. Selecting an eliminated option un-eliminates it.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the question is not multiple choice or lacks the option.
    pub fn select_choice(&mut self, letter: OptionLetter) -> Result<(), AnswerError> {
        self.require_option(letter)?;
        self.crossed_out.remove(&letter);
        self.response = Some(Response::Choice(letter));
        Ok(())
    }

    /// Store a free response verbatim; normalization happens at submission.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::NotFreeResponse` for non-SPR questions.
    pub fn set_free_response(&mut self, text: impl Into<String>) -> Result<(), AnswerError> {
        match self.snapshot.kind {
            AnswerKind::FreeResponse => {
                self.response = Some(Response::FreeText(text.into()));
                Ok(())
            }
            AnswerKind::Unresolved => Err(AnswerError::Unresolved(self.key)),
            AnswerKind::MultipleChoice { .. } => {
                Err(AnswerError::NotFreeResponse(self.question_id().clone()))
            }
        }
    }

    /// Flip elimination of an option. Returns whether the option is now crossed out.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the question is not multiple choice or lacks the option.
    pub fn toggle_cross_out(&mut self, letter: OptionLetter) -> Result<bool, AnswerError> {
        self.require_option(letter)?;
        if self.crossed_out.remove(&letter) {
            Ok(false)
        } else {
            self.crossed_out.insert(letter);
            Ok(true)
        }
    }

    /// Restore an eliminated option. Returns whether it had been crossed out.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the question is not multiple choice or lacks the option.
    pub fn undo_cross_out(&mut self, letter: OptionLetter) -> Result<bool, AnswerError> {
        self.require_option(letter)?;
        Ok(self.crossed_out.remove(&letter))
    }

    /// Flip the review flag and return the new value.
    pub fn toggle_mark(&mut self) -> bool {
        self.marked = !self.marked;
        self.marked
    }

    /// Add elapsed seconds to the accumulator. Negative or non-finite values
    /// are rejected and leave the accumulator untouched.
    pub fn add_time(&mut self, elapsed_secs: f64) -> bool {
        if !elapsed_secs.is_finite() || elapsed_secs < 0.0 {
            return false;
        }
        self.time_spent_secs += elapsed_secs;
        true
    }

    fn require_option(&self, letter: OptionLetter) -> Result<(), AnswerError> {
        match &self.snapshot.kind {
            AnswerKind::MultipleChoice { letters } if letters.contains(&letter) => Ok(()),
            AnswerKind::MultipleChoice { .. } => Err(AnswerError::UnknownOption {
                question: self.question_id().clone(),
                letter,
            }),
            AnswerKind::FreeResponse => {
                Err(AnswerError::NotMultipleChoice(self.question_id().clone()))
            }
            AnswerKind::Unresolved => Err(AnswerError::Unresolved(self.key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice_state() -> AnswerState {
        let question = QuestionRecord::multiple_choice("q1", "Pick", &["1", "2", "3", "4"], "B");
        AnswerState::new(AnswerKey::new(0, 1), AnswerSnapshot::from_question(&question))
    }

    fn spr_state() -> AnswerState {
        let question = QuestionRecord::free_response("q2", "Solve", "3.5|7/2");
        AnswerState::new(AnswerKey::new(0, 2), AnswerSnapshot::from_question(&question))
    }

    #[test]
    fn selecting_an_eliminated_option_restores_it() {
        let mut state = choice_state();
        assert!(state.toggle_cross_out(OptionLetter::C).unwrap());
        assert!(state.toggle_cross_out(OptionLetter::D).unwrap());

        state.select_choice(OptionLetter::C).unwrap();

        assert_eq!(state.selected_choice(), Some(OptionLetter::C));
        assert!(!state.is_crossed_out(OptionLetter::C));
        assert!(state.is_crossed_out(OptionLetter::D));
    }

    #[test]
    fn crossing_out_does_not_touch_selection() {
        let mut state = choice_state();
        state.select_choice(OptionLetter::A).unwrap();
        assert!(state.toggle_cross_out(OptionLetter::A).unwrap());
        assert_eq!(state.selected_choice(), Some(OptionLetter::A));

        assert!(state.undo_cross_out(OptionLetter::A).unwrap());
        assert!(!state.undo_cross_out(OptionLetter::A).unwrap());
    }

    #[test]
    fn choice_rejects_missing_option_and_free_text() {
        let mut state = choice_state();
        let err = state.select_choice(OptionLetter::E).unwrap_err();
        assert!(matches!(err, AnswerError::UnknownOption { .. }));
        let err = state.set_free_response("3").unwrap_err();
        assert!(matches!(err, AnswerError::NotFreeResponse(_)));
    }

    #[test]
    fn free_response_is_stored_verbatim() {
        let mut state = spr_state();
        state.set_free_response("  3.5 ").unwrap();
        assert_eq!(state.spr_answer(), Some("  3.5 "));
        assert!(state.selected_choice().is_none());
        assert!(state.is_answered());

        state.set_free_response("   ").unwrap();
        assert!(!state.is_answered());

        let err = state.toggle_cross_out(OptionLetter::A).unwrap_err();
        assert!(matches!(err, AnswerError::NotMultipleChoice(_)));
    }

    #[test]
    fn negative_time_is_rejected() {
        let mut state = choice_state();
        assert!(state.add_time(1.5));
        assert!(!state.add_time(-2.0));
        assert!(!state.add_time(f64::NAN));
        assert!((state.time_spent_secs() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn fallback_snapshot_has_synthesized_id_and_no_expected_answer() {
        let key = AnswerKey::new(2, 4);
        let mut state = AnswerState::new(key, AnswerSnapshot::fallback(key));
        assert!(state.is_fallback());
        assert_eq!(state.question_id().as_str(), "unresolved-m2-q4");
        assert_eq!(state.snapshot().expected_answer(), None);
        assert_eq!(
            state.select_choice(OptionLetter::A).unwrap_err(),
            AnswerError::Unresolved(key)
        );
        assert!(state.toggle_mark());
    }
}
