use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearnerError {
    #[error("learner email cannot be empty")]
    Empty,

    #[error("not a valid email address: {0:?}")]
    InvalidEmail(String),
}

/// Durable learner identity: a trimmed, email-shaped string.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LearnerId(String);

impl LearnerId {
    /// Validate and normalize a raw learner email.
    ///
    /// # Errors
    ///
    /// Returns `LearnerError::Empty` for blank input and
    /// `LearnerError::InvalidEmail` when the value is not `local@domain`.
    pub fn parse(raw: &str) -> Result<Self, LearnerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LearnerError::Empty);
        }
        let valid = match trimmed.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !trimmed.contains(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(LearnerError::InvalidEmail(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LearnerId({})", self.0)
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LearnerId {
    type Err = LearnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LearnerId {
    type Error = LearnerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LearnerId> for String {
    fn from(value: LearnerId) -> Self {
        value.0
    }
}
