mod answer;
mod countdown;
mod ids;
mod learner;
mod module;
mod question;
mod submission;
mod view;

pub use ids::{AnswerKey, ModuleId, QuestionId, SessionId};

pub use answer::{AnswerError, AnswerKind, AnswerSnapshot, AnswerState, Response};
pub use countdown::{Countdown, format_clock};
pub use learner::{LearnerError, LearnerId};
pub use module::{ModuleCatalog, ModuleCategory, ModuleDescriptor};
pub use question::{
    ChoiceOption, OptionLetter, QuestionError, QuestionKind, QuestionRecord, QuestionWire,
    parse_question_bank,
};
pub use submission::{NO_ANSWER, SubmissionRecord};
pub use view::ExamView;
