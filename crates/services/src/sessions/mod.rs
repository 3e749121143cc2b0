mod controller;
mod progress;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{NavigationError, SessionError};
pub use controller::{ModuleAdvance, QuestionAdvance, SessionController};
pub use progress::{ModuleProgress, NavigatorEntry};
pub use view::{ViewEvent, ViewStateMachine, transition};
pub use workflow::{DEFAULT_SECONDS_PER_QUESTION, DeliveryStatus, ExamSession, TickOutcome};
