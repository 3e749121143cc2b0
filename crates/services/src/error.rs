//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{AnswerError, ExamView, LearnerError, ModuleId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::sessions::ViewEvent;

/// Rejected position changes. The workflow logs and ignores these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
    #[error("position {position} is outside 1..={len}")]
    OutOfRange { position: usize, len: usize },
    #[error("already at the first question")]
    AtFirstQuestion,
    #[error("a module load is in flight")]
    Loading,
    #[error("no module is active")]
    NoActiveModule,
}

/// Errors emitted by the exam session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("failed to load module {module}: {source}")]
    Load {
        module: ModuleId,
        #[source]
        source: StorageError,
    },
    #[error("module {module} has no questions")]
    EmptyModule { module: ModuleId },
    #[error("test flow is empty")]
    EmptyFlow,
    #[error("session has not been started")]
    NotStarted,
    #[error("a module load is already in flight")]
    LoadInFlight,
    #[error("no question is open in view {0}")]
    NotInModule(ExamView),
    #[error("cannot apply {event:?} in view {from}")]
    InvalidTransition { from: ExamView, event: ViewEvent },
    #[error("session already finished")]
    AlreadyFinished,
    #[error("submission delivery failed: {0}")]
    Delivery(#[source] StorageError),
    #[error("no submission to deliver")]
    NothingToDeliver,
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

impl SessionError {
    /// True for the failures that return the learner to `Home`.
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            SessionError::Load { .. } | SessionError::EmptyModule { .. }
        )
    }
}

/// Errors emitted by `LearnerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LearnerServiceError {
    #[error(transparent)]
    Learner(#[from] LearnerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Invalid remote endpoint configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteConfigError {
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{name} must be an http(s) URL, got {value}")]
    UnsupportedScheme { name: &'static str, value: String },
    #[error("question base URL must end with '/', got {0}")]
    MissingTrailingSlash(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Remote(#[from] RemoteConfigError),
    #[error(transparent)]
    Learner(#[from] LearnerServiceError),
}
