use exam_core::model::LearnerId;
use exam_core::time::fixed_now;
use storage::repository::{LearnerRepository, Storage};
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_learner_round_trip_and_replace() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_learner?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(repo.get_learner().await.unwrap().is_none());

    let first = LearnerId::parse("first@example.com").unwrap();
    repo.save_learner(&first, fixed_now()).await.unwrap();
    assert_eq!(repo.get_learner().await.unwrap(), Some(first));

    let second = LearnerId::parse("second@example.com").unwrap();
    repo.save_learner(&second, fixed_now()).await.unwrap();
    assert_eq!(repo.get_learner().await.unwrap(), Some(second));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let learner = LearnerId::parse("x@example.com").unwrap();
    repo.save_learner(&learner, fixed_now()).await.unwrap();
    assert_eq!(repo.get_learner().await.unwrap(), Some(learner));
}

#[tokio::test]
async fn storage_sqlite_wires_learner_repository() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    let learner = LearnerId::parse("kept@example.com").unwrap();
    storage
        .learners
        .save_learner(&learner, fixed_now())
        .await
        .unwrap();
    assert_eq!(storage.learners.get_learner().await.unwrap(), Some(learner));
}
