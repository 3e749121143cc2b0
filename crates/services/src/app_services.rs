use std::path::PathBuf;
use std::sync::Arc;

use exam_core::model::ModuleCatalog;
use storage::json_dir::{JsonDirQuestionSource, JsonDirSubmissionSink};
use storage::repository::Storage;
use tracing::info;

use crate::error::AppServicesError;
use crate::learner_service::LearnerService;
use crate::remote::{HttpQuestionSource, HttpSubmissionSink, RemoteConfig};
use crate::sessions::{DEFAULT_SECONDS_PER_QUESTION, ExamSession};
use crate::Clock;

/// Where questions come from and where submissions go.
///
/// Remote endpoints win over local directories; with neither configured the
/// in-memory collaborators of `Storage` are used.
#[derive(Clone, Debug)]
pub struct SourceOptions {
    pub questions_dir: Option<PathBuf>,
    pub submissions_dir: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub seconds_per_question: u32,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            questions_dir: None,
            submissions_dir: None,
            remote: RemoteConfig::default(),
            seconds_per_question: DEFAULT_SECONDS_PER_QUESTION,
        }
    }
}

/// Assembles app-facing services.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    catalog: Arc<ModuleCatalog>,
    storage: Storage,
    learners: Arc<LearnerService>,
    seconds_per_question: u32,
}

impl AppServices {
    /// Build services with the learner key backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        options: SourceOptions,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, options))
    }

    /// Wire services over an existing `Storage`, replacing its question source
    /// and submission sink as `options` dictate.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, options: SourceOptions) -> Self {
        let mut storage = storage;
        if let Some(base) = options.remote.question_base_url.clone() {
            info!(%base, "questions from remote store");
            storage = storage.with_questions(Arc::new(HttpQuestionSource::new(base)));
        } else if let Some(dir) = options.questions_dir.as_ref() {
            info!(dir = %dir.display(), "questions from local directory");
            storage = storage.with_questions(Arc::new(JsonDirQuestionSource::new(dir)));
        }

        if let Some(url) = options.remote.submission_url.clone() {
            info!(%url, "submissions to remote endpoint");
            let sink = HttpSubmissionSink::new(url)
                .with_stringified_verdicts(options.remote.stringify_verdicts);
            storage = storage.with_submissions(Arc::new(sink));
        } else if let Some(dir) = options.submissions_dir.as_ref() {
            info!(dir = %dir.display(), "submissions to local directory");
            storage = storage.with_submissions(Arc::new(JsonDirSubmissionSink::new(dir)));
        }

        let learners = Arc::new(LearnerService::new(clock, Arc::clone(&storage.learners)));
        Self {
            clock,
            catalog: Arc::new(ModuleCatalog::builtin()),
            storage,
            learners,
            seconds_per_question: options.seconds_per_question,
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// A fresh, unstarted exam session over the configured collaborators.
    #[must_use]
    pub fn new_session(&self) -> ExamSession {
        ExamSession::new(
            self.clock,
            Arc::clone(&self.catalog),
            Arc::clone(&self.storage.questions),
            Arc::clone(&self.storage.submissions),
        )
        .with_seconds_per_question(self.seconds_per_question)
    }

    #[must_use]
    pub fn learners(&self) -> Arc<LearnerService> {
        Arc::clone(&self.learners)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<ModuleCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{ExamView, LearnerId, ModuleId};
    use exam_core::time::fixed_clock;

    #[tokio::test]
    async fn local_directory_drives_a_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("M1.json"),
            r#"[{"question_id": "q1", "option_a": "x", "option_b": "y", "correct_answer": "B"}]"#,
        )
        .unwrap();

        let services = AppServices::from_storage(
            Storage::in_memory(),
            fixed_clock(),
            SourceOptions {
                questions_dir: Some(dir.path().to_path_buf()),
                submissions_dir: Some(dir.path().join("out")),
                ..SourceOptions::default()
            },
        );
        let mut session = services.new_session();
        let learner = LearnerId::parse("kim@example.com").unwrap();
        session.start(learner, vec![ModuleId::new("M1")]).await.unwrap();
        session.select_choice(exam_core::model::OptionLetter::B).unwrap();
        session.next().unwrap();
        assert_eq!(session.advance_module().await.unwrap(), ExamView::Finished);

        let written = std::fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn learner_service_shares_storage() {
        let storage = Storage::in_memory();
        let services =
            AppServices::from_storage(storage.clone(), fixed_clock(), SourceOptions::default());
        services.learners().remember("kim@example.com").await.unwrap();

        let stored = storage.learners.get_learner().await.unwrap();
        assert_eq!(stored.unwrap().as_str(), "kim@example.com");
    }
}
