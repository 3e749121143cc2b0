#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod learner_service;
pub mod remote;
pub mod sessions;
pub mod submission;

pub use exam_core::Clock;
pub use sessions as session;

pub use app_services::{AppServices, SourceOptions};
pub use error::{
    AppServicesError, LearnerServiceError, NavigationError, RemoteConfigError, SessionError,
};
pub use learner_service::LearnerService;
pub use remote::{HttpQuestionSource, HttpSubmissionSink, RemoteConfig};
pub use sessions::{
    DeliveryStatus, ExamSession, ModuleProgress, NavigatorEntry, SessionController, TickOutcome,
    ViewEvent, ViewStateMachine,
};
pub use submission::SubmissionAssembler;
