use exam_core::model::{ExamView, LearnerId, ModuleId};
use exam_core::time::fixed_clock;
use serde_json::Value;
use services::{AppServices, RemoteConfig, SourceOptions};
use storage::repository::Storage;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn remote_session_fetches_bank_and_posts_submission() {
    let server = MockServer::start().await;
    let bank = serde_json::json!([
        {"question_id": "rw-1", "question_text": "Pick", "option_a": "x", "option_b": "y", "correct_answer": "A"}
    ]);
    Mock::given(method("GET"))
        .and(path("/banks/DT-T0-RW-M1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&bank))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collect"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteConfig::from_values(
        Some(&format!("{}/banks/", server.uri())),
        Some(&format!("{}/collect", server.uri())),
        true,
    )
    .unwrap();
    let services = AppServices::from_storage(
        Storage::in_memory(),
        fixed_clock(),
        SourceOptions {
            remote,
            ..SourceOptions::default()
        },
    );

    let mut session = services.new_session();
    let learner = LearnerId::parse("kim@example.com").unwrap();
    session
        .start(learner, vec![ModuleId::new("DT-T0-RW-M1")])
        .await
        .unwrap();
    assert_eq!(
        session.current_module().unwrap().display_name(),
        "Reading and Writing: Module 1"
    );
    session.select_choice(exam_core::model::OptionLetter::A).unwrap();
    session.next().unwrap();
    assert_eq!(session.advance_module().await.unwrap(), ExamView::Finished);

    let posted = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|request| request.method.as_str() == "POST")
        .unwrap();
    let rows: Value = serde_json::from_slice(&posted.body).unwrap();
    assert_eq!(rows[0]["question_id"], "rw-1");
    assert_eq!(rows[0]["quiz_name"], "DT-T0-RW-M1");
    assert_eq!(rows[0]["is_correct"], "TRUE");
}
