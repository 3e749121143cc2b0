//! Question banks and submission payloads kept as JSON files in a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use exam_core::model::{ModuleId, QuestionRecord, SubmissionRecord, parse_question_bank};
use tracing::{debug, info};

use crate::repository::{QuestionSource, StorageError, SubmissionSink};

/// Reads `<root>/<module id>.json` question banks.
#[derive(Debug, Clone)]
pub struct JsonDirQuestionSource {
    root: PathBuf,
}

impl JsonDirQuestionSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a module's bank file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` for identifiers that would escape the root.
    pub fn bank_path(&self, module: &ModuleId) -> Result<PathBuf, StorageError> {
        let id = module.as_str();
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(StorageError::InvalidKey(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl QuestionSource for JsonDirQuestionSource {
    async fn fetch(&self, module: &ModuleId) -> Result<Vec<QuestionRecord>, StorageError> {
        let path = self.bank_path(module)?;
        debug!(path = %path.display(), "reading question bank");
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => StorageError::NotFound,
                _ => StorageError::Connection(err.to_string()),
            })?;
        parse_question_bank(&raw).map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

/// Writes each payload to `<root>/<timestamp>-<learner>.json`.
///
/// Offline stand-in for the remote collection endpoint.
#[derive(Debug, Clone)]
pub struct JsonDirSubmissionSink {
    root: PathBuf,
}

impl JsonDirSubmissionSink {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SubmissionSink for JsonDirSubmissionSink {
    async fn send(&self, records: &[SubmissionRecord]) -> Result<(), StorageError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let learner: String = first
            .student_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let file_name = format!(
            "{}-{learner}.json",
            first.timestamp.format("%Y%m%dT%H%M%S%.3fZ")
        );
        let body = serde_json::to_vec_pretty(records)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        let path = self.root.join(file_name);
        tokio::fs::write(&path, body)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        info!(path = %path.display(), records = records.len(), "submission written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::time::fixed_now;

    #[tokio::test]
    async fn reads_bank_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("M1.json"),
            r#"[{"question_id": "q1", "option_a": "x", "option_b": "y", "correct_answer": "A"}]"#,
        )
        .unwrap();

        let source = JsonDirQuestionSource::new(dir.path());
        let questions = source.fetch(&ModuleId::new("M1")).await.unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].expected_answer(), "A");
    }

    #[tokio::test]
    async fn missing_file_is_not_found_and_bad_json_is_serialization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Bad.json"), "{}").unwrap();
        let source = JsonDirQuestionSource::new(dir.path());

        let err = source.fetch(&ModuleId::new("Nope")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let err = source.fetch(&ModuleId::new("Bad")).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let source = JsonDirQuestionSource::new("/tmp");
        let err = source.fetch(&ModuleId::new("../etc/passwd")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn sink_writes_payload_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSubmissionSink::new(dir.path().join("out"));
        let record = SubmissionRecord {
            timestamp: fixed_now(),
            student_id: "a@example.com".into(),
            quiz_name: "M1".into(),
            question_id: "q1".into(),
            student_answer: "B".into(),
            is_correct: true,
            time_spent_seconds: 1.25,
        };

        sink.send(&[record.clone()]).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let written: Vec<SubmissionRecord> =
            serde_json::from_slice(&std::fs::read(&entries[0]).unwrap()).unwrap();
        assert_eq!(written, vec![record]);
    }
}
