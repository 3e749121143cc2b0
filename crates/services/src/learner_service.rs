use std::sync::Arc;

use exam_core::model::LearnerId;
use storage::repository::LearnerRepository;
use tracing::info;

use crate::Clock;
use crate::error::LearnerServiceError;

/// Remembers who is taking the exam across runs.
#[derive(Clone)]
pub struct LearnerService {
    clock: Clock,
    repo: Arc<dyn LearnerRepository>,
}

impl LearnerService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn LearnerRepository>) -> Self {
        Self { clock, repo }
    }

    /// Load the remembered learner, if any.
    ///
    /// # Errors
    ///
    /// Returns `LearnerServiceError::Storage` on storage failures.
    pub async fn load(&self) -> Result<Option<LearnerId>, LearnerServiceError> {
        Ok(self.repo.get_learner().await?)
    }

    /// Validate and persist a learner identifier.
    ///
    /// # Errors
    ///
    /// Returns `LearnerServiceError` if validation fails or persistence fails.
    pub async fn remember(&self, raw: &str) -> Result<LearnerId, LearnerServiceError> {
        let learner = LearnerId::parse(raw)?;
        self.repo.save_learner(&learner, self.clock.now()).await?;
        info!(learner = %learner, "learner remembered");
        Ok(learner)
    }

    /// Use `explicit` when given (and remember it), else the remembered learner.
    ///
    /// # Errors
    ///
    /// Returns `LearnerServiceError` if the explicit value is invalid or storage fails.
    pub async fn resolve(
        &self,
        explicit: Option<&str>,
    ) -> Result<Option<LearnerId>, LearnerServiceError> {
        match explicit {
            Some(raw) => self.remember(raw).await.map(Some),
            None => self.load().await,
        }
    }
}
