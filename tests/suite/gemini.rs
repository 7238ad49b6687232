//! Full runs against a mocked Gemini endpoint, wired up from a config file.

use std::fs;
use std::path::Path;

use lookalike_engine::{CancelFlag, CheckpointStore, GeminiClient, LookalikeConfig};
use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    build_runner, fast_options, fast_policy, gemini_body, judgment_json, mount_gemini_text,
    write_input,
};

const MODEL: &str = "gemini-test";

fn write_config(dir: &Path, server: &MockServer) -> LookalikeConfig {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!(
            r#"[google]
api_key = "test-key"
model = "{MODEL}"
base_url = "{}"
timeout_seconds = 5

[run]
batch_size = 2
batch_delay_ms = 0
retry_backoff_ms = 0
max_attempts = 2
"#,
            server.uri()
        ),
    )
    .unwrap();
    LookalikeConfig::load_from(&path).unwrap()
}

fn client_from(config: &LookalikeConfig) -> GeminiClient {
    GeminiClient::with_base_url(
        config.api_key().unwrap(),
        config.model(),
        config.base_url(),
        config.timeout(),
    )
    .unwrap()
}

#[tokio::test]
async fn configured_client_judges_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{MODEL}:generateContent")))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("from Gujarat state"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_body(&format!("```json\n{}\n```", judgment_json(0.8)))),
        )
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &server);
    let input = write_input(
        dir.path(),
        &[
            ("KIRIT PATEL", "KIRIT PATEL", "Gujarat"),
            ("HARESH PATEL", "HARESH PATIL", "Gujarat"),
            ("MANOJ DESAI", "MANOJ DESHAI", "Gujarat"),
        ],
    );
    let output = dir.path().join("results").join("out.csv");

    let summary = build_runner(
        client_from(&config),
        &output,
        config.run_options().unwrap(),
        config.retry_policy(),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(summary.judged, 3);
    assert_eq!(summary.persisted_total, 3);

    let records = CheckpointStore::new(&output).load_records().unwrap();
    assert_eq!(records.len(), 3);
    let patil = records
        .iter()
        .find(|r| r.pair().dummy_name() == "HARESH PATIL")
        .unwrap();
    assert!(patil.judgment().is_confusable());
    assert!((patil.judgment().confusion_score().value() - 0.8).abs() < f64::EPSILON);
}

#[tokio::test]
async fn rate_limited_call_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after-ms", "10")
                .set_body_string("quota exceeded"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_gemini_text(&server, MODEL, &judgment_json(0.3)).await;

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &server);
    let input = write_input(dir.path(), &[("LALIT JAIN", "LALITA JAIN", "Delhi")]);
    let output = dir.path().join("out.csv");

    let summary = build_runner(
        client_from(&config),
        &output,
        fast_options(5),
        fast_policy(2),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(summary.judged, 1);
    assert_eq!(summary.unresolved, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn blocked_responses_leave_pair_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &server);
    let input = write_input(dir.path(), &[("VIKRAM RAO", "VIKRAM RAJ", "Karnataka")]);
    let output = dir.path().join("out.csv");

    let summary = build_runner(
        client_from(&config),
        &output,
        config.run_options().unwrap(),
        config.retry_policy(),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(summary.unresolved, 1);
    assert_eq!(summary.persisted_total, 0);
    assert!(!output.exists());
}

#[tokio::test]
async fn dry_run_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &server);
    let input = write_input(
        dir.path(),
        &[
            ("ARUN NAIR", "ARUN NAYAR", "Kerala"),
            ("SAJI NAIR", "SAJI NAYAR", "Kerala"),
        ],
    );
    let output = dir.path().join("out.csv");

    let mut options = config.run_options().unwrap();
    options.dry_run = true;
    let summary = build_runner(
        client_from(&config),
        &output,
        options,
        config.retry_policy(),
        CancelFlag::new(),
    )
    .run(&input)
    .await
    .unwrap();

    assert_eq!(summary.input_total, 2);
    assert_eq!(summary.remaining(), 2);
    assert_eq!(summary.attempted, 0);
    assert!(!output.exists());
}
