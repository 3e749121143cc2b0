use exam_core::model::ExamView;
use tracing::debug;

use crate::error::SessionError;

/// Inputs of the view state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// First module loaded.
    SessionStarted,
    /// Learner asked for the review page, or moved past the last question.
    OpenReview,
    /// Learner picked a question from the review page.
    ReturnToQuestion,
    ModuleLoading,
    ModuleLoaded,
    /// Last module left, or the countdown expired.
    SessionCompleted,
    LoadFailed,
    /// Retry of a module transition that failed earlier.
    ResumeInterrupted,
    Reset,
}

/// Pure transition function.
///
/// # Errors
///
/// Returns `SessionError::AlreadyFinished` when completing a finished session
/// and `SessionError::InvalidTransition` for any other event the view does
/// not accept.
pub fn transition(from: ExamView, event: ViewEvent) -> Result<ExamView, SessionError> {
    use ExamView::{Finished, Home, InModule, ModuleTransition, ReviewPage};

    let to = match (from, event) {
        (_, ViewEvent::Reset | ViewEvent::LoadFailed) => Home,
        (Home, ViewEvent::SessionStarted) => InModule,
        (Home, ViewEvent::ResumeInterrupted) => ModuleTransition,
        (InModule, ViewEvent::OpenReview) => ReviewPage,
        (ReviewPage, ViewEvent::ReturnToQuestion) => InModule,
        (ReviewPage, ViewEvent::ModuleLoading) => ModuleTransition,
        (ModuleTransition, ViewEvent::ModuleLoaded) => InModule,
        (InModule | ReviewPage, ViewEvent::SessionCompleted) => Finished,
        (Finished, ViewEvent::SessionCompleted) => return Err(SessionError::AlreadyFinished),
        (from, event) => return Err(SessionError::InvalidTransition { from, event }),
    };
    Ok(to)
}

/// Current exam view plus the guard that lets `Finished` be entered once.
#[derive(Debug, Clone, Default)]
pub struct ViewStateMachine {
    current: ExamView,
}

impl ViewStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> ExamView {
        self.current
    }

    /// Check that `event` would be accepted, without applying it.
    ///
    /// # Errors
    ///
    /// Same as `transition`.
    pub fn check(&self, event: ViewEvent) -> Result<ExamView, SessionError> {
        transition(self.current, event)
    }

    /// Apply `event` and return the new view.
    ///
    /// # Errors
    ///
    /// Same as `transition`; the view is unchanged on error.
    pub fn apply(&mut self, event: ViewEvent) -> Result<ExamView, SessionError> {
        let next = transition(self.current, event)?;
        debug!(from = %self.current, to = %next, ?event, "view transition");
        self.current = next;
        Ok(next)
    }
}
