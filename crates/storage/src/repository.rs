use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{LearnerId, ModuleId, QuestionRecord, SubmissionRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Supplies the ordered questions of a module.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch the questions of `module` in presentation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown modules, or other storage
    /// errors when the source is unreachable or the data is malformed.
    async fn fetch(&self, module: &ModuleId) -> Result<Vec<QuestionRecord>, StorageError>;
}

/// Receives the final submission payload of a session.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Deliver all records of one session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records could not be delivered.
    async fn send(&self, records: &[SubmissionRecord]) -> Result<(), StorageError>;
}

/// Durable storage of the last learner identity.
#[async_trait]
pub trait LearnerRepository: Send + Sync {
    /// Load the remembered learner, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_learner(&self) -> Result<Option<LearnerId>, StorageError>;

    /// Remember `learner`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn save_learner(
        &self,
        learner: &LearnerId,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    banks: Arc<Mutex<HashMap<ModuleId, Vec<QuestionRecord>>>>,
    fetches: Arc<Mutex<Vec<ModuleId>>>,
    deliveries: Arc<Mutex<Vec<Vec<SubmissionRecord>>>>,
    learner: Arc<Mutex<Option<LearnerId>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the question bank of a module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_bank(
        &self,
        module: ModuleId,
        questions: Vec<QuestionRecord>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .banks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(module, questions);
        Ok(())
    }

    /// Forget the question bank of a module; later fetches fail with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn remove_bank(&self, module: &ModuleId) -> Result<(), StorageError> {
        let mut guard = self
            .banks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(module);
        Ok(())
    }

    /// Modules fetched so far, in call order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn fetch_log(&self) -> Result<Vec<ModuleId>, StorageError> {
        let guard = self
            .fetches
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    /// Payloads received so far, one entry per `send` call.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn deliveries(&self) -> Result<Vec<Vec<SubmissionRecord>>, StorageError> {
        let guard = self
            .deliveries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl QuestionSource for InMemoryRepository {
    async fn fetch(&self, module: &ModuleId) -> Result<Vec<QuestionRecord>, StorageError> {
        self.fetches
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .push(module.clone());
        let guard = self
            .banks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(module).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SubmissionSink for InMemoryRepository {
    async fn send(&self, records: &[SubmissionRecord]) -> Result<(), StorageError> {
        let mut guard = self
            .deliveries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(records.to_vec());
        Ok(())
    }
}

#[async_trait]
impl LearnerRepository for InMemoryRepository {
    async fn get_learner(&self) -> Result<Option<LearnerId>, StorageError> {
        let guard = self
            .learner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_learner(
        &self,
        learner: &LearnerId,
        _saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .learner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(learner.clone());
        Ok(())
    }
}

/// Aggregates the session collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionSource>,
    pub submissions: Arc<dyn SubmissionSink>,
    pub learners: Arc<dyn LearnerRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    /// All collaborators backed by one shared in-memory repository.
    #[must_use]
    pub fn from_repo(repo: InMemoryRepository) -> Self {
        let questions: Arc<dyn QuestionSource> = Arc::new(repo.clone());
        let submissions: Arc<dyn SubmissionSink> = Arc::new(repo.clone());
        let learners: Arc<dyn LearnerRepository> = Arc::new(repo);
        Self {
            questions,
            submissions,
            learners,
        }
    }

    #[must_use]
    pub fn with_questions(mut self, questions: Arc<dyn QuestionSource>) -> Self {
        self.questions = questions;
        self
    }

    #[must_use]
    pub fn with_submissions(mut self, submissions: Arc<dyn SubmissionSink>) -> Self {
        self.submissions = submissions;
        self
    }
}
