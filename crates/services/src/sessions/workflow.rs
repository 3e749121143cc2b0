use std::sync::Arc;

use tracing::{debug, error, info, warn};

use exam_core::model::{
    AnswerState, Countdown, ExamView, LearnerId, ModuleCatalog, ModuleDescriptor, ModuleId,
    OptionLetter, QuestionRecord, SessionId, SubmissionRecord, format_clock,
};
use storage::repository::{QuestionSource, SubmissionSink};

use crate::Clock;
use crate::error::{NavigationError, SessionError};
use crate::submission::SubmissionAssembler;
use super::controller::{ModuleAdvance, QuestionAdvance, SessionController};
use super::progress::{ModuleProgress, NavigatorEntry};
use super::view::{ViewEvent, ViewStateMachine};

/// Countdown budget per question when a module has no fixed time limit.
pub const DEFAULT_SECONDS_PER_QUESTION: u32 = 60;

/// Outcome of the last delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeliveryStatus {
    #[default]
    NotAttempted,
    Delivered,
    Failed(String),
}

/// Result of a countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No countdown is armed.
    Idle,
    Remaining { secs: u32, display: String },
    /// Time ran out and the session was submitted.
    Expired,
}

/// One exam session: controller, view, countdown and the collaborators it talks to.
///
/// Every mutation is a `&mut self` call, so a tick can never interleave with a
/// navigation or a module load.
pub struct ExamSession {
    id: SessionId,
    clock: Clock,
    catalog: Arc<ModuleCatalog>,
    questions: Arc<dyn QuestionSource>,
    submissions: Arc<dyn SubmissionSink>,
    assembler: SubmissionAssembler,
    controller: SessionController,
    view: ViewStateMachine,
    learner: Option<LearnerId>,
    countdown: Option<Countdown>,
    seconds_per_question: u32,
    submission: Option<Vec<SubmissionRecord>>,
    delivery: DeliveryStatus,
    last_error: Option<String>,
}

impl ExamSession {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<ModuleCatalog>,
        questions: Arc<dyn QuestionSource>,
        submissions: Arc<dyn SubmissionSink>,
    ) -> Self {
        Self {
            id: SessionId::random(),
            clock,
            assembler: SubmissionAssembler::new(Arc::clone(&catalog)),
            catalog,
            questions,
            submissions,
            controller: SessionController::new(),
            view: ViewStateMachine::new(),
            learner: None,
            countdown: None,
            seconds_per_question: DEFAULT_SECONDS_PER_QUESTION,
            submission: None,
            delivery: DeliveryStatus::NotAttempted,
            last_error: None,
        }
    }

    #[must_use]
    pub fn with_seconds_per_question(mut self, secs: u32) -> Self {
        self.seconds_per_question = secs.max(1);
        self
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Start a fresh session for `learner` over `flow`, discarding any previous state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyFlow`, or a load error when the first module
    /// cannot be fetched; the session then stays unstarted on `Home`.
    pub async fn start(
        &mut self,
        learner: LearnerId,
        flow: Vec<ModuleId>,
    ) -> Result<ExamView, SessionError> {
        if self.view.current() != ExamView::Home {
            self.reset();
        }
        self.clear_outcome();
        let first = self.controller.begin(flow)?;
        self.id = SessionId::random();
        self.learner = Some(learner);
        info!(session_id = %self.id, module = %first, "starting session");

        self.load_pending(first).await?;
        self.view.apply(ViewEvent::SessionStarted)
    }

    /// Leave the review page: load the next module, or finish and submit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside the review page, a load
    /// error (view back on `Home`, answers kept for `resume`), or
    /// `SessionError::Delivery` when the final payload could not be sent.
    pub async fn advance_module(&mut self) -> Result<ExamView, SessionError> {
        self.view.check(ViewEvent::ModuleLoading)?;
        let now = self.clock.now();
        match self.controller.prepare_module_advance(now)? {
            ModuleAdvance::SessionComplete => self.finish().await,
            ModuleAdvance::Load { index, module } => {
                info!(session_id = %self.id, module = %module, index, "advancing module");
                self.view.apply(ViewEvent::ModuleLoading)?;
                self.load_pending(module).await?;
                self.view.apply(ViewEvent::ModuleLoaded)
            }
        }
    }

    /// Retry the module transition that failed last.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` when there is nothing to resume, or a
    /// load error when the retry fails again.
    pub async fn resume(&mut self) -> Result<ExamView, SessionError> {
        self.view.check(ViewEvent::ResumeInterrupted)?;
        if !self.controller.is_started() {
            return Err(SessionError::NotStarted);
        }
        let now = self.clock.now();
        let ModuleAdvance::Load { module, .. } = self.controller.prepare_module_advance(now)?
        else {
            return Err(SessionError::NotStarted);
        };
        info!(session_id = %self.id, module = %module, "resuming session");
        self.view.apply(ViewEvent::ResumeInterrupted)?;
        self.load_pending(module).await?;
        self.view.apply(ViewEvent::ModuleLoaded)
    }

    /// Advance the countdown. On expiry the session is submitted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Delivery` when the auto-submitted payload could
    /// not be sent.
    pub async fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        let Some(countdown) = self.countdown else {
            return Ok(TickOutcome::Idle);
        };
        if !matches!(self.view.current(), ExamView::InModule | ExamView::ReviewPage) {
            return Ok(TickOutcome::Idle);
        }

        let now = self.clock.now();
        if countdown.is_expired(now) {
            info!(session_id = %self.id, "time is up, submitting");
            self.finish().await?;
            return Ok(TickOutcome::Expired);
        }
        let secs = countdown.remaining_secs(now);
        Ok(TickOutcome::Remaining {
            secs,
            display: format_clock(secs),
        })
    }

    /// Send the retained payload again after a failed delivery.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NothingToDeliver` before the session finished, or
    /// `SessionError::Delivery` when sending fails again.
    pub async fn retry_delivery(&mut self) -> Result<(), SessionError> {
        if self.submission.is_none() {
            return Err(SessionError::NothingToDeliver);
        }
        if self.delivery == DeliveryStatus::Delivered {
            return Ok(());
        }
        self.deliver().await
    }

    /// Back to `Home` with every piece of session state cleared.
    pub fn reset(&mut self) {
        if self.submission.is_some() && self.delivery != DeliveryStatus::Delivered {
            warn!(session_id = %self.id, "discarding undelivered submission");
        }
        self.controller.reset();
        self.countdown = None;
        self.clear_outcome();
        // Reset is accepted from every view.
        let _ = self.view.apply(ViewEvent::Reset);
        info!(session_id = %self.id, "session reset");
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Next question; past the last one the review page opens.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInModule` outside `InModule`.
    pub fn next(&mut self) -> Result<ExamView, SessionError> {
        self.require_in_module()?;
        let now = self.clock.now();
        match self.controller.advance_question(now) {
            Ok(QuestionAdvance::Moved) => Ok(self.view.current()),
            Ok(QuestionAdvance::ModuleComplete) => self.open_review(),
            Err(err) => Ok(self.ignore_navigation(err)),
        }
    }

    /// Previous question. Ignored on question 1.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInModule` outside `InModule`.
    pub fn back(&mut self) -> Result<ExamView, SessionError> {
        self.require_in_module()?;
        let now = self.clock.now();
        if let Err(err) = self.controller.retreat_question(now) {
            return Ok(self.ignore_navigation(err));
        }
        Ok(self.view.current())
    }

    /// Go to `position` from the navigator or the review page. Out-of-range
    /// positions are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInModule` unless in `InModule` or `ReviewPage`.
    pub fn jump_to(&mut self, position: usize) -> Result<ExamView, SessionError> {
        let from = self.view.current();
        if !matches!(from, ExamView::InModule | ExamView::ReviewPage) {
            return Err(SessionError::NotInModule(from));
        }
        let now = self.clock.now();
        if let Err(err) = self.controller.jump_to(position, now) {
            return Ok(self.ignore_navigation(err));
        }
        if from == ExamView::ReviewPage {
            self.view.apply(ViewEvent::ReturnToQuestion)?;
        }
        Ok(self.view.current())
    }

    /// Show the review page. Time stops accruing until a question is reopened.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside `InModule`.
    pub fn open_review(&mut self) -> Result<ExamView, SessionError> {
        let view = self.view.apply(ViewEvent::OpenReview)?;
        self.controller.suspend(self.clock.now());
        Ok(view)
    }

    /// Leave the review page back to the question that was open.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` outside the review page.
    pub fn return_to_question(&mut self) -> Result<ExamView, SessionError> {
        let view = self.view.apply(ViewEvent::ReturnToQuestion)?;
        self.controller.resume_timing(self.clock.now());
        Ok(view)
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError` outside `InModule` or when the choice is invalid.
    pub fn select_choice(&mut self, letter: OptionLetter) -> Result<(), SessionError> {
        self.require_in_module()?;
        self.controller.select_choice(letter)
    }

    /// # Errors
    ///
    /// Returns `SessionError` outside `InModule` or for non-SPR questions.
    pub fn enter_free_response(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.require_in_module()?;
        self.controller.enter_free_response(text)
    }

    /// # Errors
    ///
    /// Returns `SessionError` outside `InModule` or when the option does not exist.
    pub fn toggle_cross_out(&mut self, letter: OptionLetter) -> Result<bool, SessionError> {
        self.require_in_module()?;
        self.controller.toggle_cross_out(letter)
    }

    /// # Errors
    ///
    /// Returns `SessionError` outside `InModule` or when the option does not exist.
    pub fn undo_cross_out(&mut self, letter: OptionLetter) -> Result<bool, SessionError> {
        self.require_in_module()?;
        self.controller.undo_cross_out(letter)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotInModule` outside `InModule`.
    pub fn toggle_cross_out_tool(&mut self) -> Result<bool, SessionError> {
        self.require_in_module()?;
        Ok(self.controller.toggle_cross_out_tool())
    }

    /// # Errors
    ///
    /// Returns `SessionError` outside `InModule`.
    pub fn toggle_mark(&mut self) -> Result<bool, SessionError> {
        self.require_in_module()?;
        self.controller.toggle_mark()
    }

    //
    // ─── READ ACCESSORS ────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn view(&self) -> ExamView {
        self.view.current()
    }

    #[must_use]
    pub fn learner(&self) -> Option<&LearnerId> {
        self.learner.as_ref()
    }

    #[must_use]
    pub fn flow(&self) -> &[ModuleId] {
        self.controller.flow()
    }

    #[must_use]
    pub fn current_module(&self) -> Option<ModuleDescriptor> {
        self.controller
            .current_module_id()
            .map(|id| self.catalog.resolve(id))
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuestionRecord> {
        self.controller.current_question()
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<&AnswerState> {
        self.controller.current_answer()
    }

    #[must_use]
    pub fn cross_out_tool_active(&self) -> bool {
        self.controller.cross_out_tool_active()
    }

    #[must_use]
    pub fn navigator(&self) -> Vec<NavigatorEntry> {
        self.controller.navigator()
    }

    #[must_use]
    pub fn progress(&self) -> Option<ModuleProgress> {
        self.controller.progress()
    }

    #[must_use]
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Seconds left on the module countdown, if one is armed.
    #[must_use]
    pub fn remaining_time(&self) -> Option<u32> {
        self.countdown
            .map(|countdown| countdown.remaining_secs(self.clock.now()))
    }

    /// The assembled payload, kept after a failed delivery.
    #[must_use]
    pub fn submission(&self) -> Option<&[SubmissionRecord]> {
        self.submission.as_deref()
    }

    #[must_use]
    pub fn delivery_status(&self) -> &DeliveryStatus {
        &self.delivery
    }

    /// Message of the last load failure, for the home screen.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Mutable clock access for tests driving a fixed clock.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    async fn load_pending(&mut self, module: ModuleId) -> Result<(), SessionError> {
        let questions = Arc::clone(&self.questions);
        let mut guard = InterruptedLoadGuard {
            session: &mut *self,
            armed: true,
        };
        let fetched = questions
            .fetch(&module)
            .await
            .map_err(|source| SessionError::Load {
                module: module.clone(),
                source,
            });
        guard.armed = false;
        drop(guard);

        let result = match fetched {
            Ok(questions) => self.controller.complete_module_load(questions, self.clock.now()),
            Err(err) => {
                self.controller.abort_module_load();
                Err(err)
            }
        };

        match result {
            Ok(()) => {
                self.last_error = None;
                self.arm_countdown(&module);
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "module load failed");
                self.countdown = None;
                self.last_error = Some(err.to_string());
                let _ = self.view.apply(ViewEvent::LoadFailed);
                Err(err)
            }
        }
    }

    fn arm_countdown(&mut self, module: &ModuleId) {
        let question_count = u32::try_from(self.controller.questions().len()).unwrap_or(u32::MAX);
        let duration = self
            .catalog
            .resolve(module)
            .time_limit_secs()
            .unwrap_or_else(|| question_count.saturating_mul(self.seconds_per_question));
        debug!(module = %module, duration, "countdown armed");
        self.countdown = Some(Countdown::new(self.clock.now(), duration));
    }

    async fn finish(&mut self) -> Result<ExamView, SessionError> {
        self.view.check(ViewEvent::SessionCompleted)?;
        let learner = self.learner.clone().ok_or(SessionError::NotStarted)?;
        let now = self.clock.now();
        self.controller.suspend(now);
        self.countdown = None;
        let view = self.view.apply(ViewEvent::SessionCompleted)?;

        let records =
            self.assembler
                .build(self.controller.flow(), self.controller.answers(), &learner, now);
        info!(session_id = %self.id, records = records.len(), "session finished");
        self.submission = Some(records);
        self.deliver().await?;
        Ok(view)
    }

    async fn deliver(&mut self) -> Result<(), SessionError> {
        let Some(records) = self.submission.as_deref() else {
            return Err(SessionError::NothingToDeliver);
        };
        match self.submissions.send(records).await {
            Ok(()) => {
                info!(session_id = %self.id, records = records.len(), "submission delivered");
                self.delivery = DeliveryStatus::Delivered;
                Ok(())
            }
            Err(err) => {
                error!(session_id = %self.id, error = %err, "submission delivery failed");
                self.delivery = DeliveryStatus::Failed(err.to_string());
                Err(SessionError::Delivery(err))
            }
        }
    }

    fn clear_outcome(&mut self) {
        self.submission = None;
        self.delivery = DeliveryStatus::NotAttempted;
        self.last_error = None;
    }

    fn require_in_module(&self) -> Result<(), SessionError> {
        match self.view.current() {
            ExamView::InModule => Ok(()),
            other => Err(SessionError::NotInModule(other)),
        }
    }

    fn ignore_navigation(&self, err: NavigationError) -> ExamView {
        debug!(session_id = %self.id, error = %err, "navigation ignored");
        self.view.current()
    }
}

/// Rolls back a module load whose future was dropped before the fetch returned.
///
/// The session goes back to `Home` with the previous module intact, exactly as
/// after a failed fetch, so `resume` can retry the transition.
struct InterruptedLoadGuard<'a> {
    session: &'a mut ExamSession,
    armed: bool,
}

impl Drop for InterruptedLoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let session = &mut *self.session;
        warn!(session_id = %session.id, "module load interrupted");
        session.controller.abort_module_load();
        session.countdown = None;
        session.last_error = Some("module load was interrupted".to_string());
        let _ = session.view.apply(ViewEvent::LoadFailed);
    }
}
