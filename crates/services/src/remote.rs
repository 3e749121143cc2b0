//! HTTP adapters for the remote question store and submission endpoint.

use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use exam_core::model::{ModuleId, QuestionRecord, SubmissionRecord, parse_question_bank};
use storage::repository::{QuestionSource, StorageError, SubmissionSink};

use crate::error::RemoteConfigError;

/// Remote endpoints, all optional; local adapters are used for missing ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    pub question_base_url: Option<Url>,
    pub submission_url: Option<Url>,
    pub stringify_verdicts: bool,
}

impl RemoteConfig {
    /// Read `EXAM_QUESTION_BASE_URL`, `EXAM_SUBMISSION_URL` and
    /// `EXAM_STRINGIFY_VERDICTS`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteConfigError` for malformed URLs.
    pub fn from_env() -> Result<Self, RemoteConfigError> {
        let question_base_url = env::var("EXAM_QUESTION_BASE_URL").ok();
        let submission_url = env::var("EXAM_SUBMISSION_URL").ok();
        let stringify_verdicts = env::var("EXAM_STRINGIFY_VERDICTS")
            .is_ok_and(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"));
        Self::from_values(
            question_base_url.as_deref(),
            submission_url.as_deref(),
            stringify_verdicts,
        )
    }

    /// # Errors
    ///
    /// Returns `RemoteConfigError` for malformed URLs, non-http schemes, or a
    /// question base URL without a trailing `/`.
    pub fn from_values(
        question_base_url: Option<&str>,
        submission_url: Option<&str>,
        stringify_verdicts: bool,
    ) -> Result<Self, RemoteConfigError> {
        let question_base_url = parse_optional("EXAM_QUESTION_BASE_URL", question_base_url)?;
        if let Some(url) = &question_base_url {
            if !url.path().ends_with('/') {
                return Err(RemoteConfigError::MissingTrailingSlash(url.to_string()));
            }
        }
        let submission_url = parse_optional("EXAM_SUBMISSION_URL", submission_url)?;
        Ok(Self {
            question_base_url,
            submission_url,
            stringify_verdicts,
        })
    }
}

fn parse_optional(name: &'static str, raw: Option<&str>) -> Result<Option<Url>, RemoteConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(raw).map_err(|source| RemoteConfigError::InvalidUrl { name, source })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RemoteConfigError::UnsupportedScheme {
            name,
            value: raw.to_string(),
        });
    }
    Ok(Some(url))
}

fn transport_error(err: &reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

//
// ─── QUESTION SOURCE ───────────────────────────────────────────────────────────
//

/// Fetches `<base><module id>.json`.
#[derive(Clone, Debug)]
pub struct HttpQuestionSource {
    client: Client,
    base_url: Url,
}

impl HttpQuestionSource {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` when the module id does not form a URL.
    pub fn bank_url(&self, module: &ModuleId) -> Result<Url, StorageError> {
        let id = module.as_str();
        if id.is_empty() || id.contains(['/', '?', '#']) {
            return Err(StorageError::InvalidKey(id.to_string()));
        }
        self.base_url
            .join(&format!("{id}.json"))
            .map_err(|_| StorageError::InvalidKey(id.to_string()))
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn fetch(&self, module: &ModuleId) -> Result<Vec<QuestionRecord>, StorageError> {
        let url = self.bank_url(module)?;
        debug!(%url, "fetching question bank");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound),
            status => {
                return Err(StorageError::Connection(format!(
                    "question store returned status {status}"
                )));
            }
        }

        let body = response.text().await.map_err(|e| transport_error(&e))?;
        parse_question_bank(&body).map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

//
// ─── SUBMISSION SINK ───────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Verdict {
    Flag(bool),
    Text(&'static str),
}

/// Row layout expected by the collection endpoint.
#[derive(Debug, Serialize)]
struct SubmissionRow<'a> {
    timestamp: DateTime<Utc>,
    student_gmail_id: &'a str,
    quiz_name: &'a str,
    question_id: &'a str,
    student_answer: &'a str,
    is_correct: Verdict,
    time_spent_seconds: f64,
}

impl<'a> SubmissionRow<'a> {
    fn from_record(record: &'a SubmissionRecord, stringify_verdicts: bool) -> Self {
        let is_correct = match (stringify_verdicts, record.is_correct) {
            (false, flag) => Verdict::Flag(flag),
            (true, true) => Verdict::Text("TRUE"),
            (true, false) => Verdict::Text("FALSE"),
        };
        Self {
            timestamp: record.timestamp,
            student_gmail_id: &record.student_id,
            quiz_name: &record.quiz_name,
            question_id: &record.question_id,
            student_answer: &record.student_answer,
            is_correct,
            time_spent_seconds: record.time_spent_seconds,
        }
    }
}

/// POSTs the whole payload as one JSON array.
#[derive(Clone, Debug)]
pub struct HttpSubmissionSink {
    client: Client,
    url: Url,
    stringify_verdicts: bool,
}

impl HttpSubmissionSink {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
            stringify_verdicts: false,
        }
    }

    /// Send `is_correct` as `"TRUE"`/`"FALSE"` instead of a JSON boolean.
    #[must_use]
    pub fn with_stringified_verdicts(mut self, enabled: bool) -> Self {
        self.stringify_verdicts = enabled;
        self
    }
}

#[async_trait]
impl SubmissionSink for HttpSubmissionSink {
    async fn send(&self, records: &[SubmissionRecord]) -> Result<(), StorageError> {
        let rows: Vec<_> = records
            .iter()
            .map(|record| SubmissionRow::from_record(record, self.stringify_verdicts))
            .collect();
        let response = self
            .client
            .post(self.url.clone())
            .json(&rows)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Connection(format!(
                "submission endpoint returned status {status}"
            )));
        }
        info!(url = %self.url, records = rows.len(), "submission posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::time::fixed_now;
    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(is_correct: bool) -> SubmissionRecord {
        SubmissionRecord {
            timestamp: fixed_now(),
            student_id: "kim@example.com".into(),
            quiz_name: "DT-T0-MT-M1".into(),
            question_id: "q7".into(),
            student_answer: "C".into(),
            is_correct,
            time_spent_seconds: 12.5,
        }
    }

    #[test]
    fn config_validates_urls() {
        let config = RemoteConfig::from_values(
            Some("https://example.com/banks/"),
            Some("https://example.com/collect"),
            true,
        )
        .unwrap();
        assert_eq!(
            config.question_base_url.unwrap().as_str(),
            "https://example.com/banks/"
        );
        assert!(config.stringify_verdicts);

        assert!(matches!(
            RemoteConfig::from_values(Some("https://example.com/banks"), None, false),
            Err(RemoteConfigError::MissingTrailingSlash(_))
        ));
        assert!(matches!(
            RemoteConfig::from_values(None, Some("not a url"), false),
            Err(RemoteConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            RemoteConfig::from_values(None, Some("ftp://example.com/x"), false),
            Err(RemoteConfigError::UnsupportedScheme { .. })
        ));
        assert_eq!(
            RemoteConfig::from_values(Some("  "), None, false).unwrap(),
            RemoteConfig::default()
        );
    }

    #[tokio::test]
    async fn fetches_bank_by_module_id() {
        let server = MockServer::start().await;
        let body = serde_json::json!([
            {"question_id": 1, "question_text": "2+2?", "option_a": "3", "option_b": "4", "correct_answer": "B"},
            {"question_id": "s1", "type": "student_produced_response", "correct_answer": "3.5|7/2"}
        ]);
        Mock::given(method("GET"))
            .and(path("/banks/DT-T0-MT-M1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/banks/", server.uri())).unwrap();
        let source = HttpQuestionSource::new(base);
        let questions = source.fetch(&ModuleId::new("DT-T0-MT-M1")).await.unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id().as_str(), "1");
        assert!(questions[1].kind().is_free_response());
    }

    #[tokio::test]
    async fn missing_bank_and_bad_body_are_load_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Broken.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"a list\"}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Down.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        let source = HttpQuestionSource::new(base);

        let err = source.fetch(&ModuleId::new("Missing")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        let err = source.fetch(&ModuleId::new("Broken")).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        let err = source.fetch(&ModuleId::new("Down")).await.unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
        let err = source.fetch(&ModuleId::new("a/b")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn posts_rows_with_endpoint_field_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collect"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/collect", server.uri())).unwrap();
        let sink = HttpSubmissionSink::new(url);
        sink.send(&[record(true)]).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let rows: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let row = &rows[0];
        assert_eq!(row["student_gmail_id"], "kim@example.com");
        assert_eq!(row["quiz_name"], "DT-T0-MT-M1");
        assert_eq!(row["student_answer"], "C");
        assert_eq!(row["is_correct"], true);
        assert_eq!(row["time_spent_seconds"], 12.5);
    }

    #[tokio::test]
    async fn stringified_verdicts_and_failed_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/fail"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ok = Url::parse(&format!("{}/ok", server.uri())).unwrap();
        HttpSubmissionSink::new(ok)
            .with_stringified_verdicts(true)
            .send(&[record(false)])
            .await
            .unwrap();
        let requests = server.received_requests().await.unwrap();
        let rows: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(rows[0]["is_correct"], "FALSE");

        let fail = Url::parse(&format!("{}/fail", server.uri())).unwrap();
        let err = HttpSubmissionSink::new(fail)
            .send(&[record(true)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }
}
