use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("malformed question bank: {0}")]
    Malformed(String),

    #[error("question at index {index} has no id")]
    MissingId { index: usize },

    #[error("question {id} has no answer options")]
    NoOptions { id: String },

    #[error("question {id} has unknown type {kind:?}")]
    UnknownType { id: String, kind: String },

    #[error("invalid option letter: {0:?}")]
    InvalidLetter(String),
}

//
// ─── OPTION LETTERS ────────────────────────────────────────────────────────────
//

/// Slot label of a multiple-choice option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
    E,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 5] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
        OptionLetter::E,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
            OptionLetter::E => "E",
        }
    }

    /// Case-insensitive conversion from a single character.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLetter::A),
            'B' => Some(OptionLetter::B),
            'C' => Some(OptionLetter::C),
            'D' => Some(OptionLetter::D),
            'E' => Some(OptionLetter::E),
            _ => None,
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionLetter {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                OptionLetter::from_char(c).ok_or_else(|| QuestionError::InvalidLetter(s.into()))
            }
            _ => Err(QuestionError::InvalidLetter(s.into())),
        }
    }
}

//
// ─── QUESTION RECORD ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub letter: OptionLetter,
    pub text: String,
}

/// Answer variant of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    MultipleChoice { options: Vec<ChoiceOption> },
    /// Student-produced response: free-text numeric entry.
    FreeResponse,
}

impl QuestionKind {
    #[must_use]
    pub fn is_free_response(&self) -> bool {
        matches!(self, QuestionKind::FreeResponse)
    }

    /// Letters of the options present on this question (empty for free response).
    #[must_use]
    pub fn letters(&self) -> Vec<OptionLetter> {
        match self {
            QuestionKind::MultipleChoice { options } => {
                options.iter().map(|option| option.letter).collect()
            }
            QuestionKind::FreeResponse => Vec::new(),
        }
    }

    /// Wire tag of this variant.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::FreeResponse => "student_produced_response",
        }
    }
}

/// One question as supplied by a question source.
///
/// `expected_answer` is a single letter for multiple choice, or one or more
/// `|`-separated literal alternatives for free response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    id: QuestionId,
    prompt: String,
    image_url: Option<String>,
    kind: QuestionKind,
    expected_answer: String,
}

impl QuestionRecord {
    #[must_use]
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        kind: QuestionKind,
        expected_answer: impl Into<String>,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            image_url: None,
            kind,
            expected_answer: expected_answer.into(),
        }
    }

    /// Convenience constructor for a multiple-choice question with texts for
    /// consecutive slots starting at `A`.
    #[must_use]
    pub fn multiple_choice(
        id: impl Into<String>,
        prompt: impl Into<String>,
        options: &[&str],
        expected_answer: impl Into<String>,
    ) -> Self {
        let options = OptionLetter::ALL
            .iter()
            .zip(options)
            .map(|(letter, text)| ChoiceOption {
                letter: *letter,
                text: (*text).to_string(),
            })
            .collect();
        Self::new(
            QuestionId::new(id),
            prompt,
            QuestionKind::MultipleChoice { options },
            expected_answer,
        )
    }

    #[must_use]
    pub fn free_response(
        id: impl Into<String>,
        prompt: impl Into<String>,
        expected_answer: impl Into<String>,
    ) -> Self {
        Self::new(
            QuestionId::new(id),
            prompt,
            QuestionKind::FreeResponse,
            expected_answer,
        )
    }

    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn expected_answer(&self) -> &str {
        &self.expected_answer
    }

    #[must_use]
    pub fn option(&self, letter: OptionLetter) -> Option<&ChoiceOption> {
        match &self.kind {
            QuestionKind::MultipleChoice { options } => {
                options.iter().find(|option| option.letter == letter)
            }
            QuestionKind::FreeResponse => None,
        }
    }
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

/// JSON shape of one question in a question bank document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionWire {
    #[serde(default)]
    pub question_id: Option<Value>,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub option_a: Option<String>,
    #[serde(default)]
    pub option_b: Option<String>,
    #[serde(default)]
    pub option_c: Option<String>,
    #[serde(default)]
    pub option_d: Option<String>,
    #[serde(default)]
    pub option_e: Option<String>,
    #[serde(default, rename = "type")]
    pub question_type: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<Value>,
}

impl QuestionWire {
    /// Convert into a validated `QuestionRecord`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the id is missing, the type tag is unknown,
    /// or a multiple-choice question carries no options.
    pub fn into_record(self, index: usize) -> Result<QuestionRecord, QuestionError> {
        let id = self
            .question_id
            .as_ref()
            .and_then(scalar_to_string)
            .filter(|id| !id.is_empty())
            .ok_or(QuestionError::MissingId { index })?;

        let type_tag = self
            .question_type
            .as_deref()
            .map(|tag| tag.trim().to_ascii_lowercase());
        let kind = match type_tag.as_deref() {
            None | Some("" | "multiple_choice") => {
                let slots = [
                    self.option_a,
                    self.option_b,
                    self.option_c,
                    self.option_d,
                    self.option_e,
                ];
                let options: Vec<ChoiceOption> = OptionLetter::ALL
                    .into_iter()
                    .zip(slots)
                    .filter_map(|(letter, text)| text.map(|text| ChoiceOption { letter, text }))
                    .collect();
                if options.is_empty() {
                    return Err(QuestionError::NoOptions { id });
                }
                QuestionKind::MultipleChoice { options }
            }
            Some("student_produced_response") => QuestionKind::FreeResponse,
            Some(other) => {
                return Err(QuestionError::UnknownType {
                    id,
                    kind: other.to_string(),
                });
            }
        };

        let expected_answer = self
            .correct_answer
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_default();

        Ok(QuestionRecord {
            id: QuestionId::new(id),
            prompt: self.question_text.unwrap_or_default(),
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            kind,
            expected_answer,
        })
    }
}

/// Parse a question bank document (a JSON array of question objects).
///
/// An empty array parses successfully; callers decide whether that is usable.
///
/// # Errors
///
/// Returns `QuestionError::Malformed` for invalid JSON or a non-array document,
/// and the per-record errors of [`QuestionWire::into_record`].
pub fn parse_question_bank(json: &str) -> Result<Vec<QuestionRecord>, QuestionError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| QuestionError::Malformed(err.to_string()))?;
    if !value.is_array() {
        return Err(QuestionError::Malformed(
            "expected a JSON array of questions".into(),
        ));
    }
    let wires: Vec<QuestionWire> =
        serde_json::from_value(value).map_err(|err| QuestionError::Malformed(err.to_string()))?;

    wires
        .into_iter()
        .enumerate()
        .map(|(index, wire)| wire.into_record(index))
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
