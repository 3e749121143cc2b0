/// One cell of the question navigator for the active module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigatorEntry {
    pub position: usize,
    pub answered: bool,
    pub marked: bool,
    pub current: bool,
}

/// Aggregated view of where the learner is, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleProgress {
    /// 1-based module number within the test flow.
    pub module_number: usize,
    pub module_count: usize,
    /// 1-based question number within the module.
    pub question_number: usize,
    pub question_count: usize,
    pub answered: usize,
    pub marked: usize,
}

impl ModuleProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.question_count.saturating_sub(self.answered)
    }

    #[must_use]
    pub fn is_last_module(&self) -> bool {
        self.module_number == self.module_count
    }
}
