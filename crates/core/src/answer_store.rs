//! Keyed storage of per-question answer state for a whole session.

use std::collections::HashMap;

use tracing::warn;

use crate::model::{
    AnswerError, AnswerKey, AnswerSnapshot, AnswerState, OptionLetter, QuestionRecord,
};

/// Answer entries addressed by `(module index, position)`, kept in order of
/// first visit.
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    entries: Vec<AnswerState>,
    index: HashMap<AnswerKey, usize>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key`, created on first access.
    ///
    /// `question` is the loaded record at that position when the key belongs to
    /// the active module. Without it a fallback entry is created; that only
    /// happens when the caller addresses a module whose questions are gone.
    pub fn get_or_insert(
        &mut self,
        key: AnswerKey,
        question: Option<&QuestionRecord>,
    ) -> &mut AnswerState {
        if let Some(&slot) = self.index.get(&key) {
            return &mut self.entries[slot];
        }

        let snapshot = match question {
            Some(question) => AnswerSnapshot::from_question(question),
            None => {
                warn!(%key, "creating fallback answer entry without a loaded question");
                AnswerSnapshot::fallback(key)
            }
        };
        let slot = self.entries.len();
        self.entries.push(AnswerState::new(key, snapshot));
        self.index.insert(key, slot);
        &mut self.entries[slot]
    }

    #[must_use]
    pub fn get(&self, key: AnswerKey) -> Option<&AnswerState> {
        self.index.get(&key).map(|&slot| &self.entries[slot])
    }

    #[must_use]
    pub fn contains(&self, key: AnswerKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Add elapsed time to an existing entry.
    ///
    /// Returns `false` (and changes nothing) for a missing entry or a negative
    /// interval.
    pub fn record_time(&mut self, key: AnswerKey, elapsed_secs: f64) -> bool {
        self.entry_mut(key)
            .is_ok_and(|state| state.add_time(elapsed_secs))
    }

    /// # Errors
    ///
    /// Returns `AnswerError` if the entry is missing or rejects the choice.
    pub fn set_choice(&mut self, key: AnswerKey, letter: OptionLetter) -> Result<(), AnswerError> {
        self.entry_mut(key)?.select_choice(letter)
    }

    /// # Errors
    ///
    /// Returns `AnswerError` if the entry is missing or is not a free-response entry.
    pub fn set_free_response(
        &mut self,
        key: AnswerKey,
        text: impl Into<String>,
    ) -> Result<(), AnswerError> {
        self.entry_mut(key)?.set_free_response(text)
    }

    /// # Errors
    ///
    /// Returns `AnswerError` if the entry is missing or lacks the option.
    pub fn toggle_cross_out(
        &mut self,
        key: AnswerKey,
        letter: OptionLetter,
    ) -> Result<bool, AnswerError> {
        self.entry_mut(key)?.toggle_cross_out(letter)
    }

    /// # Errors
    ///
    /// Returns `AnswerError` if the entry is missing or lacks the option.
    pub fn undo_cross_out(
        &mut self,
        key: AnswerKey,
        letter: OptionLetter,
    ) -> Result<bool, AnswerError> {
        self.entry_mut(key)?.undo_cross_out(letter)
    }

    /// # Errors
    ///
    /// Returns `AnswerError::Unresolved` if the entry is missing.
    pub fn toggle_mark(&mut self, key: AnswerKey) -> Result<bool, AnswerError> {
        Ok(self.entry_mut(key)?.toggle_mark())
    }

    /// Entries in order of first visit.
    pub fn iter(&self) -> impl Iterator<Item = &AnswerState> {
        self.entries.iter()
    }

    /// Entries of one module, in order of first visit.
    pub fn module_entries(&self, module_index: usize) -> impl Iterator<Item = &AnswerState> {
        self.entries
            .iter()
            .filter(move |state| state.key().module_index() == module_index)
    }

    #[must_use]
    pub fn module_time_secs(&self, module_index: usize) -> f64 {
        self.module_entries(module_index)
            .map(AnswerState::time_spent_secs)
            .sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    fn entry_mut(&mut self, key: AnswerKey) -> Result<&mut AnswerState, AnswerError> {
        match self.index.get(&key) {
            Some(&slot) => Ok(&mut self.entries[slot]),
            None => Err(AnswerError::Unresolved(key)),
        }
    }
}
