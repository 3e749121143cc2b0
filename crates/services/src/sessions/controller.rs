use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use exam_core::AnswerStore;
use exam_core::model::{AnswerKey, AnswerState, ModuleId, OptionLetter, QuestionRecord};
use exam_core::time::elapsed_secs;

use crate::error::{NavigationError, SessionError};
use super::progress::{ModuleProgress, NavigatorEntry};

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of moving forward within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionAdvance {
    Moved,
    /// Already on the last question; the caller opens the review page.
    ModuleComplete,
}

/// Result of asking for the next module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleAdvance {
    /// The caller must fetch `module` and report back with
    /// `complete_module_load` or `abort_module_load`.
    Load { index: usize, module: ModuleId },
    SessionComplete,
}

#[derive(Debug, Clone, Copy)]
struct PendingLoad {
    index: usize,
    initial: bool,
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Test flow, session position and per-question time accounting.
///
/// The controller never performs I/O. Module loads are split in two phases so
/// the caller can await the question source in between; while a load is
/// pending every navigation request is rejected.
///
/// Time is attributed to the active answer entry from the moment it became
/// active until the next `finalize_time`, which every position change runs
/// before moving.
#[derive(Debug, Default)]
pub struct SessionController {
    flow: Vec<ModuleId>,
    module_index: usize,
    position: usize,
    questions: Vec<QuestionRecord>,
    answers: AnswerStore,
    active_since: Option<DateTime<Utc>>,
    module_started_at: Option<DateTime<Utc>>,
    pending: Option<PendingLoad>,
    cross_out_tool: bool,
}

impl SessionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all session state and stage the load of the first module.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyFlow` for an empty flow and
    /// `SessionError::LoadInFlight` while another load is pending.
    pub fn begin(&mut self, flow: Vec<ModuleId>) -> Result<ModuleId, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::LoadInFlight);
        }
        let Some(first) = flow.first().cloned() else {
            return Err(SessionError::EmptyFlow);
        };

        self.reset();
        self.flow = flow;
        self.pending = Some(PendingLoad {
            index: 0,
            initial: true,
        });
        Ok(first)
    }

    /// Stage the transition to the next module of the flow.
    ///
    /// Time on the current question is finalized and accounting is suspended.
    /// The active module stays in place until the load completes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before `begin` and
    /// `SessionError::LoadInFlight` while another load is pending.
    pub fn prepare_module_advance(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<ModuleAdvance, SessionError> {
        if self.flow.is_empty() {
            return Err(SessionError::NotStarted);
        }
        if self.pending.is_some() {
            return Err(SessionError::LoadInFlight);
        }

        self.suspend(now);
        let next = self.module_index + 1;
        let Some(module) = self.flow.get(next).cloned() else {
            return Ok(ModuleAdvance::SessionComplete);
        };
        self.pending = Some(PendingLoad {
            index: next,
            initial: false,
        });
        Ok(ModuleAdvance::Load {
            index: next,
            module,
        })
    }

    /// Make the fetched questions the active module, positioned at question 1.
    ///
    /// An empty sequence is treated like a failed load.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` when no load is pending and
    /// `SessionError::EmptyModule` for an empty sequence.
    pub fn complete_module_load(
        &mut self,
        questions: Vec<QuestionRecord>,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let Some(pending) = self.pending else {
            return Err(SessionError::NotStarted);
        };
        if questions.is_empty() {
            let module = self.flow[pending.index].clone();
            self.abort_module_load();
            return Err(SessionError::EmptyModule { module });
        }

        self.pending = None;
        self.module_index = pending.index;
        self.questions = questions;
        self.position = 1;
        self.cross_out_tool = false;
        self.module_started_at = Some(now);
        self.activate(now);
        Ok(())
    }

    /// Drop a pending load.
    ///
    /// A failed first load leaves the controller unstarted. A failed module
    /// transition keeps the previous module, its position and every recorded
    /// answer, so the same transition can be retried.
    pub fn abort_module_load(&mut self) {
        match self.pending.take() {
            Some(PendingLoad { initial: true, .. }) => self.reset(),
            Some(PendingLoad { index, .. }) => {
                warn!(module_index = index, "module load aborted");
            }
            None => {}
        }
    }

    /// Move to the next question, or report that the module is complete.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError` while loading or without an active module.
    pub fn advance_question(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<QuestionAdvance, NavigationError> {
        self.ensure_navigable()?;
        if self.position >= self.questions.len() {
            return Ok(QuestionAdvance::ModuleComplete);
        }
        self.move_to(self.position + 1, now);
        Ok(QuestionAdvance::Moved)
    }

    /// Move to the previous question.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::AtFirstQuestion` on question 1.
    pub fn retreat_question(&mut self, now: DateTime<Utc>) -> Result<(), NavigationError> {
        self.ensure_navigable()?;
        if self.position <= 1 {
            return Err(NavigationError::AtFirstQuestion);
        }
        self.move_to(self.position - 1, now);
        Ok(())
    }

    /// Move directly to `position` (1-based).
    ///
    /// Also resumes time accounting when it was suspended by the review page.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::OutOfRange` outside `1..=module length`; the
    /// position is left unchanged.
    pub fn jump_to(&mut self, position: usize, now: DateTime<Utc>) -> Result<(), NavigationError> {
        self.ensure_navigable()?;
        let len = self.questions.len();
        if position == 0 || position > len {
            return Err(NavigationError::OutOfRange { position, len });
        }
        self.move_to(position, now);
        Ok(())
    }

    /// Attribute the time since the active question became active to its entry.
    ///
    /// Returns the seconds recorded. Accounting continues from `now`.
    pub fn finalize_time(&mut self, now: DateTime<Utc>) -> f64 {
        let Some(since) = self.active_since else {
            return 0.0;
        };
        let elapsed = elapsed_secs(since, now);
        let key = self.current_key();
        if !self.answers.record_time(key, elapsed) {
            warn!(%key, elapsed, "time could not be recorded");
        }
        self.active_since = Some(now.max(since));
        elapsed
    }

    /// Finalize time and stop accounting until `resume_timing` or a move.
    pub fn suspend(&mut self, now: DateTime<Utc>) {
        self.finalize_time(now);
        self.active_since = None;
    }

    /// Restart accounting on the current question without moving.
    pub fn resume_timing(&mut self, now: DateTime<Utc>) {
        if self.has_active_module() && self.pending.is_none() && self.active_since.is_none() {
            self.activate(now);
        }
    }

    /// Clear the flow, position, loaded questions and every answer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError` without an active question or when the entry rejects the choice.
    pub fn select_choice(&mut self, letter: OptionLetter) -> Result<(), SessionError> {
        let key = self.answerable_key()?;
        self.answers.set_choice(key, letter)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError` without an active question or for non-SPR questions.
    pub fn enter_free_response(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        let key = self.answerable_key()?;
        self.answers.set_free_response(key, text)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError` without an active question or when the option does not exist.
    pub fn toggle_cross_out(&mut self, letter: OptionLetter) -> Result<bool, SessionError> {
        let key = self.answerable_key()?;
        Ok(self.answers.toggle_cross_out(key, letter)?)
    }

    /// # Errors
    ///
    /// Returns `SessionError` without an active question or when the option does not exist.
    pub fn undo_cross_out(&mut self, letter: OptionLetter) -> Result<bool, SessionError> {
        let key = self.answerable_key()?;
        Ok(self.answers.undo_cross_out(key, letter)?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` without an active question.
    pub fn toggle_mark(&mut self) -> Result<bool, SessionError> {
        let key = self.answerable_key()?;
        Ok(self.answers.toggle_mark(key)?)
    }

    /// Flip the per-question cross-out tool. It is switched off on every move.
    pub fn toggle_cross_out_tool(&mut self) -> bool {
        self.cross_out_tool = !self.cross_out_tool;
        self.cross_out_tool
    }

    //
    // ─── READ ACCESSORS ────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn flow(&self) -> &[ModuleId] {
        &self.flow
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        !self.flow.is_empty()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Module identifier of the pending load, if any.
    #[must_use]
    pub fn loading_module(&self) -> Option<&ModuleId> {
        self.pending.and_then(|pending| self.flow.get(pending.index))
    }

    #[must_use]
    pub fn module_index(&self) -> usize {
        self.module_index
    }

    /// 1-based question number in the active module.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn current_module_id(&self) -> Option<&ModuleId> {
        if self.has_active_module() {
            self.flow.get(self.module_index)
        } else {
            None
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuestionRecord> {
        self.position
            .checked_sub(1)
            .and_then(|idx| self.questions.get(idx))
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<&AnswerState> {
        if self.has_active_module() {
            self.answers.get(self.current_key())
        } else {
            None
        }
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    #[must_use]
    pub fn is_timing(&self) -> bool {
        self.active_since.is_some()
    }

    #[must_use]
    pub fn module_started_at(&self) -> Option<DateTime<Utc>> {
        self.module_started_at
    }

    #[must_use]
    pub fn cross_out_tool_active(&self) -> bool {
        self.cross_out_tool
    }

    /// Per-position answered/marked/current flags of the active module.
    #[must_use]
    pub fn navigator(&self) -> Vec<NavigatorEntry> {
        (1..=self.questions.len())
            .map(|position| {
                let state = self.answers.get(AnswerKey::new(self.module_index, position));
                NavigatorEntry {
                    position,
                    answered: state.is_some_and(AnswerState::is_answered),
                    marked: state.is_some_and(AnswerState::is_marked),
                    current: position == self.position,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn progress(&self) -> Option<ModuleProgress> {
        if !self.has_active_module() {
            return None;
        }
        let navigator = self.navigator();
        Some(ModuleProgress {
            module_number: self.module_index + 1,
            module_count: self.flow.len(),
            question_number: self.position,
            question_count: self.questions.len(),
            answered: navigator.iter().filter(|entry| entry.answered).count(),
            marked: navigator.iter().filter(|entry| entry.marked).count(),
        })
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn has_active_module(&self) -> bool {
        !self.questions.is_empty()
    }

    fn current_key(&self) -> AnswerKey {
        AnswerKey::new(self.module_index, self.position)
    }

    fn ensure_navigable(&self) -> Result<(), NavigationError> {
        if self.pending.is_some() {
            return Err(NavigationError::Loading);
        }
        if !self.has_active_module() {
            return Err(NavigationError::NoActiveModule);
        }
        Ok(())
    }

    fn answerable_key(&self) -> Result<AnswerKey, SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::LoadInFlight);
        }
        if !self.has_active_module() {
            return Err(SessionError::NotStarted);
        }
        Ok(self.current_key())
    }

    fn move_to(&mut self, position: usize, now: DateTime<Utc>) {
        self.finalize_time(now);
        debug!(from = self.position, to = position, "question position changed");
        self.position = position;
        self.cross_out_tool = false;
        self.activate(now);
    }

    fn activate(&mut self, now: DateTime<Utc>) {
        let key = self.current_key();
        let question = self
            .position
            .checked_sub(1)
            .and_then(|idx| self.questions.get(idx));
        self.answers.get_or_insert(key, question);
        self.active_since = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use exam_core::time::fixed_now;

    fn module(count: usize) -> Vec<QuestionRecord> {
        (1..=count)
            .map(|n| {
                QuestionRecord::multiple_choice(
                    format!("q{n}"),
                    format!("Question {n}"),
                    &["1", "2", "3", "4"],
                    "B",
                )
            })
            .collect()
    }

    fn started(count: usize) -> SessionController {
        let mut controller = SessionController::new();
        controller
            .begin(vec![ModuleId::new("M1"), ModuleId::new("M2")])
            .unwrap();
        controller.complete_module_load(module(count), fixed_now()).unwrap();
        controller
    }

    fn secs(n: i64) -> DateTime<Utc> {
        fixed_now() + Duration::seconds(n)
    }

    fn time_at(controller: &SessionController, module: usize, position: usize) -> f64 {
        controller
            .answers()
            .get(AnswerKey::new(module, position))
            .map_or(0.0, AnswerState::time_spent_secs)
    }

    #[test]
    fn begin_rejects_empty_flow() {
        let mut controller = SessionController::new();
        assert!(matches!(
            controller.begin(Vec::new()),
            Err(SessionError::EmptyFlow)
        ));
    }

    #[test]
    fn start_creates_first_entry_at_question_one() {
        let controller = started(3);
        assert_eq!(controller.position(), 1);
        assert_eq!(controller.module_index(), 0);
        assert_eq!(controller.answers().len(), 1);
        assert_eq!(controller.current_question().unwrap().id().as_str(), "q1");
    }

    #[test]
    fn failed_first_load_leaves_controller_unstarted() {
        let mut controller = SessionController::new();
        controller.begin(vec![ModuleId::new("M1")]).unwrap();
        let err = controller.complete_module_load(Vec::new(), fixed_now()).unwrap_err();

        assert!(err.is_load_error());
        assert!(!controller.is_started());
        assert!(!controller.is_loading());
    }

    #[test]
    fn moving_finalizes_time_for_the_question_left() {
        let mut controller = started(3);
        controller.advance_question(secs(10)).unwrap();
        controller.advance_question(secs(14)).unwrap();
        controller.retreat_question(secs(20)).unwrap();

        assert!((time_at(&controller, 0, 1) - 10.0).abs() < 1e-9);
        assert!((time_at(&controller, 0, 2) - 4.0).abs() < 1e-9);
        assert!((time_at(&controller, 0, 3) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn last_question_reports_module_complete_without_moving() {
        let mut controller = started(2);
        controller.advance_question(secs(1)).unwrap();
        assert_eq!(
            controller.advance_question(secs(2)).unwrap(),
            QuestionAdvance::ModuleComplete
        );
        assert_eq!(controller.position(), 2);
    }

    #[test]
    fn retreat_on_first_question_is_rejected() {
        let mut controller = started(2);
        assert_eq!(
            controller.retreat_question(secs(1)),
            Err(NavigationError::AtFirstQuestion)
        );
    }

    #[test]
    fn jump_outside_range_keeps_position() {
        let mut controller = started(3);
        controller.jump_to(2, secs(1)).unwrap();

        for position in [0, 4, 99] {
            let err = controller.jump_to(position, secs(2)).unwrap_err();
            assert!(matches!(err, NavigationError::OutOfRange { len: 3, .. }));
            assert_eq!(controller.position(), 2);
        }
    }

    #[test]
    fn moving_switches_off_cross_out_tool() {
        let mut controller = started(2);
        assert!(controller.toggle_cross_out_tool());
        controller.advance_question(secs(1)).unwrap();
        assert!(!controller.cross_out_tool_active());
    }

    #[test]
    fn navigation_is_rejected_while_loading() {
        let mut controller = started(2);
        let advance = controller.prepare_module_advance(secs(5)).unwrap();
        assert!(matches!(advance, ModuleAdvance::Load { index: 1, .. }));

        assert_eq!(controller.jump_to(2, secs(6)), Err(NavigationError::Loading));
        assert!(matches!(
            controller.prepare_module_advance(secs(6)),
            Err(SessionError::LoadInFlight)
        ));
        assert!(matches!(
            controller.select_choice(OptionLetter::A),
            Err(SessionError::LoadInFlight)
        ));
    }

    #[test]
    fn module_load_discards_previous_questions_but_keeps_answers() {
        let mut controller = started(2);
        controller.select_choice(OptionLetter::B).unwrap();
        controller.prepare_module_advance(secs(5)).unwrap();
        controller
            .complete_module_load(
                vec![QuestionRecord::free_response("s1", "Solve", "3.5|7/2")],
                secs(7),
            )
            .unwrap();

        assert_eq!(controller.module_index(), 1);
        assert_eq!(controller.questions().len(), 1);
        let first = controller.answers().get(AnswerKey::new(0, 1)).unwrap();
        assert_eq!(first.selected_choice(), Some(OptionLetter::B));
        assert_eq!(first.snapshot().expected_answer(), Some("B"));
        assert!((first.time_spent_secs() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn aborted_transition_keeps_previous_module_for_retry() {
        let mut controller = started(2);
        controller.advance_question(secs(3)).unwrap();
        controller.prepare_module_advance(secs(5)).unwrap();
        controller.abort_module_load();

        assert!(controller.is_started());
        assert_eq!(controller.module_index(), 0);
        assert_eq!(controller.position(), 2);
        assert_eq!(controller.answers().len(), 2);
        assert!(!controller.is_timing());

        let retry = controller.prepare_module_advance(secs(9)).unwrap();
        assert_eq!(
            retry,
            ModuleAdvance::Load {
                index: 1,
                module: ModuleId::new("M2")
            }
        );
        // Nothing accrues while the transition is pending.
        assert!((time_at(&controller, 0, 2) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn last_module_reports_session_complete() {
        let mut controller = SessionController::new();
        controller.begin(vec![ModuleId::new("Only")]).unwrap();
        controller.complete_module_load(module(1), fixed_now()).unwrap();

        assert_eq!(
            controller.prepare_module_advance(secs(4)).unwrap(),
            ModuleAdvance::SessionComplete
        );
        assert!((time_at(&controller, 0, 1) - 4.0).abs() < 1e-9);
        assert!(!controller.is_timing());
    }

    #[test]
    fn suspended_time_is_not_accrued_until_resumed() {
        let mut controller = started(2);
        controller.suspend(secs(5));
        controller.finalize_time(secs(50));
        controller.resume_timing(secs(60));
        controller.advance_question(secs(61)).unwrap();

        assert!((time_at(&controller, 0, 1) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn backwards_clock_records_zero() {
        let mut controller = started(2);
        let recorded = controller.finalize_time(fixed_now() - Duration::seconds(30));
        assert!(recorded.abs() < f64::EPSILON);
        assert!(time_at(&controller, 0, 1).abs() < f64::EPSILON);
    }

    #[test]
    fn module_time_never_exceeds_wall_clock() {
        let mut controller = started(4);
        let moves: [(usize, i64); 6] = [(3, 2), (1, 5), (4, 9), (2, 9), (4, 15), (1, 21)];
        for (position, at) in moves {
            controller.jump_to(position, secs(at)).unwrap();
        }
        controller.advance_question(secs(30)).unwrap();
        controller.finalize_time(secs(33));

        let total = controller.answers().module_time_secs(0);
        assert!((total - 33.0).abs() < 1e-9);
        assert_eq!(controller.answers().len(), 4);
    }

    #[test]
    fn navigator_and_progress_reflect_answers() {
        let mut controller = started(3);
        controller.select_choice(OptionLetter::A).unwrap();
        controller.advance_question(secs(1)).unwrap();
        controller.toggle_mark().unwrap();

        let navigator = controller.navigator();
        assert_eq!(navigator.len(), 3);
        assert!(navigator[0].answered && !navigator[0].current);
        assert!(navigator[1].marked && navigator[1].current);
        assert!(!navigator[2].answered);

        let progress = controller.progress().unwrap();
        assert_eq!(progress.module_number, 1);
        assert_eq!(progress.module_count, 2);
        assert_eq!(progress.question_number, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.marked, 1);
        assert_eq!(progress.unanswered(), 2);
    }
}
