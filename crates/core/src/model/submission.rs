use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel recorded for a question left without a response.
pub const NO_ANSWER: &str = "NO_ANSWER";

/// One row of the final submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub timestamp: DateTime<Utc>,
    pub student_id: String,
    pub quiz_name: String,
    pub question_id: String,
    pub student_answer: String,
    pub is_correct: bool,
    /// Rounded to two decimal places.
    pub time_spent_seconds: f64,
}

impl SubmissionRecord {
    #[must_use]
    pub fn is_unanswered(&self) -> bool {
        self.student_answer == NO_ANSWER
    }
}
