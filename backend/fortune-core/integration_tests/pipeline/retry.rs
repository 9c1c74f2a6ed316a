use crate::support::{client_for, envelope, failure, stats_payload};

use fortune_core::error::PipelineError;
use fortune_core::pipeline::PipelineEvent;

use common::HttpStatusCode;
use models::{ApiErrorCode, DivinationRequest};

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: A persistently failing server is tried exactly three times.
///
/// **BUG THIS CATCHES**: Off-by-one retry budgets, or endless retries.
#[tokio::test]
async fn given_server_error_when_get_then_three_attempts_then_server_error() {
    // GIVEN: A server that always answers 503
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    let (client, recorder) = client_for(&server, Some(("a", "r")));

    // WHEN: Reading stats
    let error = client.stats().await.expect_err("server keeps failing");

    // THEN: The final error is the server failure, after two scheduled retries
    assert!(matches!(error, PipelineError::Server { .. }), "{error}");
    assert_eq!(error.status(), Some(HttpStatusCode(503)));
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::RetryScheduled { .. })),
        2
    );
}

#[tokio::test]
async fn given_transient_error_when_get_then_recovers_on_retry() {
    // GIVEN: One 502, then success
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .respond_with(envelope(stats_payload(4)))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, Some(("a", "r")));

    // WHEN / THEN
    let stats = client.stats().await.expect("second attempt succeeds");
    assert_eq!(stats.total_divinations, 4);
}

/// **VALUE**: Business errors are final. Repeating them cannot help.
#[tokio::test]
async fn given_business_error_when_called_then_not_retried() {
    // GIVEN: The quota is exhausted
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .respond_with(failure(200, "FREE_QUOTA_EXCEEDED", "No free readings left"))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, Some(("a", "r")));

    // WHEN
    let error = client.stats().await.expect_err("business failure");

    // THEN: One request, structured error preserved
    assert!(matches!(error, PipelineError::Business { .. }), "{error}");
    assert_eq!(error.code(), Some(ApiErrorCode::FreeQuotaExceeded));
    assert_eq!(error.user_message(), "No free readings left");
}

/// **VALUE**: Field validation surfaces the first detail message.
///
/// **WHY THIS MATTERS**: The form shows "question too long", not a generic
/// "Invalid request".
#[tokio::test]
async fn given_validation_error_when_divination_submitted_then_detail_message_surfaced() {
    // GIVEN: The server rejects the question
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/divination/start"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "error": {
                "code": "VALIDATION_ERROR",
                "message": "Validation failed",
                "details": [{ "msg": "question too long", "param": "question" }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, Some(("a", "r")));
    let request = DivinationRequest::builder()
        .with_question("Will it rain tomorrow?")
        .build()
        .expect("valid request");

    // WHEN
    let error = client.perform(&request).await.expect_err("rejected");

    // THEN
    assert!(matches!(error, PipelineError::Validation { .. }), "{error}");
    assert_eq!(error.user_message(), "question too long");
    assert_eq!(error.status(), Some(HttpStatusCode(400)));
    assert_eq!(error.details()[0].field.as_deref(), Some("question"));
}

/// **VALUE**: A submission that may have reached the server is not re-sent.
///
/// **BUG THIS CATCHES**: A 500 after the server already charged a reading
/// being retried, charging the user twice.
#[tokio::test]
async fn given_server_error_when_divination_submitted_then_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/divination/start"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, Some(("a", "r")));
    let request = DivinationRequest::builder()
        .with_question("Should I move?")
        .build()
        .expect("valid request");

    let error = client.perform(&request).await.expect_err("server failure");

    assert!(matches!(error, PipelineError::Server { .. }), "{error}");
}

#[tokio::test]
async fn given_full_result_when_divination_submitted_then_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/divination/start"))
        .respond_with(envelope(json!({
            "id": "d-1",
            "question": "Should I move?",
            "movingLine": 1,
            "hexagrams": {
                "ben": { "id": 1, "name": "Qian", "lines": [1, 1, 1, 1, 1, 1] },
                "hu": { "id": 1, "name": "Qian", "lines": [1, 1, 1, 1, 1, 1] },
                "bian": { "id": 44, "name": "Gou", "lines": [0, 1, 1, 1, 1, 1] }
            },
            "analysis": { "fortune": "吉" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, Some(("a", "r")));
    let request = DivinationRequest::builder()
        .with_question("Should I move?")
        .build()
        .expect("valid request");

    let result = client.perform(&request).await.expect("reading");

    assert_eq!(result.id.as_deref(), Some("d-1"));
    assert_eq!(result.moving_line, Some(1));
    assert!(!result.is_incomplete());
    assert!(result.completeness.is_consistent());
}
