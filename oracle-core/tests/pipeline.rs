//! End-to-end tests of the consult → map → persist pipeline.
//!
//! These run against `MockGenerator`, so no API key or network is needed.

use oracle_core::testing::{sample_conflict_map_response, sample_tables_json};
use oracle_core::{
    FailureReason, GenerationError, LoadError, MockGenerator, MockResponse, OracleConfig,
    OracleSession, ResultPersister, SessionError,
};
use std::time::Duration;
use tempfile::TempDir;

fn session_in(dir: &TempDir, mock: &MockGenerator) -> OracleSession {
    std::fs::write(dir.path().join("oracle.json"), sample_tables_json())
        .expect("Failed to write table file");

    let config = OracleConfig::default()
        .with_table_path(dir.path().join("oracle.json"))
        .with_output_dir(dir.path().join("results"))
        .with_request_timeout(Duration::from_millis(200));

    OracleSession::new(config).with_generator(mock.clone())
}

fn result_files(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path().join("results"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

// =============================================================================
// Successful runs
// =============================================================================

#[tokio::test]
async fn test_full_run_persists_bundle() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::new(vec![MockResponse::text(sample_conflict_map_response())]);
    let mut session = session_in(&dir, &mock);

    let run = session.run(4).await.expect("run should succeed");

    assert_eq!(run.elements.len(), 4);
    assert_eq!(run.map.character_names(), vec!["Ash", "Bone", "Coin", "Dust"]);
    assert_eq!(mock.call_count(), 1);

    // Sampled elements are what the prompt was built from
    let prompt = mock.last_request().expect("one request").prompt;
    for element in &run.elements {
        assert!(prompt.contains(element.as_str()), "prompt is missing {element}");
    }

    assert_eq!(result_files(&dir), 3);
    let persister = ResultPersister::new(dir.path().join("results"));
    assert_eq!(persister.list_bundles().await.unwrap(), vec![run.bundle.prefix.clone()]);

    let loaded = persister.load_bundle(&run.bundle.prefix).await.unwrap();
    assert_eq!(loaded.to_conflict_map(), run.map);
}

#[tokio::test]
async fn test_missing_keys_still_persist_empty_groups() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::new(vec![MockResponse::text(
        r#"{"characters": [{"name": "Ash"}]}"#,
    )]);
    let mut session = session_in(&dir, &mock);

    let run = session.run(2).await.expect("lenient decode should succeed");
    assert!(run.map.elements.is_empty());
    assert!(run.map.conflicts_is_empty());

    let loaded = session
        .persister()
        .load_bundle(&run.bundle.prefix)
        .await
        .unwrap();
    assert_eq!(loaded.elements, serde_json::json!([]));
    assert_eq!(loaded.conflicts, serde_json::json!([]));
}

// =============================================================================
// Failures write nothing
// =============================================================================

#[tokio::test]
async fn test_empty_consult_makes_no_call() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::new(vec![MockResponse::text(sample_conflict_map_response())]);
    let mut session = session_in(&dir, &mock);

    let err = session.run(0).await.unwrap_err();

    match err {
        SessionError::Generation(e) => assert_eq!(e.reason(), FailureReason::EmptyInput),
        other => panic!("expected EmptyInput, got {other:?}"),
    }
    assert_eq!(mock.call_count(), 0);
    assert_eq!(result_files(&dir), 0);
}

#[tokio::test]
async fn test_decode_failure_writes_nothing() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::new(vec![MockResponse::text(
        "```json\n{\"elements\": [\"a\", \n```",
    )]);
    let mut session = session_in(&dir, &mock);

    let err = session.run(4).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Generation(GenerationError::Decode(_))
    ));
    assert_eq!(result_files(&dir), 0);
}

#[tokio::test]
async fn test_service_failure_writes_nothing() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::new(vec![MockResponse::fail("quota exceeded")]);
    let mut session = session_in(&dir, &mock);

    let err = session.run(4).await.unwrap_err();

    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(result_files(&dir), 0);
}

#[tokio::test]
async fn test_timeout_is_service_error() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::new(vec![MockResponse::stall(Duration::from_secs(10))]);
    let mut session = session_in(&dir, &mock);

    let err = session.run(4).await.unwrap_err();

    match err {
        SessionError::Generation(e) => assert_eq!(e.reason(), FailureReason::ServiceError),
        other => panic!("expected ServiceError, got {other:?}"),
    }
    assert_eq!(result_files(&dir), 0);
}

#[tokio::test]
async fn test_malformed_table_file() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::default();
    let mut session = session_in(&dir, &mock);
    std::fs::write(dir.path().join("oracle.json"), "{ not json").unwrap();

    let err = session.run(4).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Load(LoadError::Malformed { .. })
    ));
    assert_eq!(mock.call_count(), 0);
}

// =============================================================================
// Writing a new oracle, then running with it
// =============================================================================

#[tokio::test]
async fn test_write_then_run() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mock = MockGenerator::new(vec![
        MockResponse::text(
            "```json\n{\"Oracle of Salt\": [\"s1\", \"s2\", \"s3\"], \"Oracle of Rust\": [\"r1\", \"r2\", \"r3\"]}\n```",
        ),
        MockResponse::text(sample_conflict_map_response()),
    ]);
    let mut session = session_in(&dir, &mock);

    session
        .write_oracle(Some("drowned empires"))
        .await
        .expect("write should succeed");
    let run = session.run(100).await.expect("run should succeed");

    assert_eq!(run.elements.len(), 6);
    assert_eq!(mock.call_count(), 2);
    assert!(mock.requests()[0].prompt.contains("drowned empires"));
}
