use std::fmt;

/// Screens of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExamView {
    #[default]
    Home,
    InModule,
    /// Between-module loading screen.
    ModuleTransition,
    /// Per-module summary and navigator shown before leaving a module.
    ReviewPage,
    Finished,
}

impl ExamView {
    /// Views in which the learner is working on questions of a loaded module.
    #[must_use]
    pub fn is_in_session(self) -> bool {
        matches!(
            self,
            ExamView::InModule | ExamView::ReviewPage | ExamView::ModuleTransition
        )
    }
}

impl fmt::Display for ExamView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExamView::Home => "home",
            ExamView::InModule => "in-module",
            ExamView::ModuleTransition => "module-transition",
            ExamView::ReviewPage => "review-page",
            ExamView::Finished => "finished",
        };
        f.write_str(label)
    }
}
