use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::LearnerId;
use sqlx::Row;

use crate::repository::{LearnerRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl LearnerRepository for SqliteRepository {
    async fn get_learner(&self) -> Result<Option<LearnerId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT learner_id
            FROM learner_profile
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row
            .try_get("learner_id")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        LearnerId::parse(&raw)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save_learner(
        &self,
        learner: &LearnerId,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO learner_profile (id, learner_id, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                learner_id = excluded.learner_id,
                updated_at = excluded.updated_at
            ",
        )
        .bind(1_i64)
        .bind(learner.as_str())
        .bind(saved_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
