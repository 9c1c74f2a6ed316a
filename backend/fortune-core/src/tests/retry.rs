// Unit tests for the retry scheduler and its use inside the pipeline.

use crate::error::PipelineError;
use crate::pipeline::{
    ClassifiedOutcome, FailureReason, PipelineEvent, RetryPolicy, is_retry_eligible,
};
use crate::request::RequestDescriptor;
use crate::tests::support::{FakeTransport, fail, ok_envelope, pipeline_with, respond};
use crate::transport::{TransportFailure, TransportFailureKind};

use common::HttpStatusCode;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

/// **VALUE**: Default policy waits 1s then 2s and stops after 3 attempts.
///
/// **WHY THIS MATTERS**: The delay before retry `n` is `unit * 2^n`. Anything
/// else either hammers a struggling server or makes the UI hang.
#[test]
fn given_default_policy_when_scheduled_then_delays_double_and_budget_is_three() {
    let mut schedule = RetryPolicy::default().schedule();

    assert_eq!(schedule.attempts_made(), 1);
    assert_eq!(schedule.next_delay(), Some(Duration::from_secs(1)));
    assert_eq!(schedule.next_delay(), Some(Duration::from_secs(2)));
    assert_eq!(schedule.next_delay(), None);
    assert_eq!(schedule.attempts_made(), 3);
}

#[test]
fn given_larger_budget_when_scheduled_then_delays_never_shrink() {
    let mut schedule = RetryPolicy::new(6, Duration::from_millis(100)).schedule();
    let delays: Vec<Duration> = std::iter::from_fn(|| schedule.next_delay()).collect();

    assert_eq!(delays.len(), 5);
    for pair in delays.windows(2) {
        assert!(pair[1] >= pair[0] * 2, "{delays:?}");
    }
}

#[test]
fn given_max_delay_when_scheduled_then_delays_are_capped() {
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(30),
    };
    let mut schedule = policy.schedule();
    let delays: Vec<Duration> = std::iter::from_fn(|| schedule.next_delay()).collect();

    assert_eq!(
        delays,
        vec![
            Duration::from_secs(20),
            Duration::from_secs(30),
            Duration::from_secs(30),
            Duration::from_secs(30)
        ]
    );
}

#[test]
fn given_no_retry_policy_when_scheduled_then_no_delay_offered() {
    assert_eq!(RetryPolicy::no_retry().schedule().next_delay(), None);
}

/// **VALUE**: Only retryable failures are eligible, and a non-idempotent
/// request only when the failure happened before anything was sent.
///
/// **BUG THIS CATCHES**: Retrying a POST after a timeout (the server may
/// already have processed it) or retrying business errors at all.
#[test]
fn given_outcomes_when_checking_eligibility_then_only_safe_retries_allowed() {
    let connect = ClassifiedOutcome::RetryableFailure(FailureReason::Network(
        TransportFailure::new(TransportFailureKind::Connect, "refused"),
    ));
    let timeout = ClassifiedOutcome::RetryableFailure(FailureReason::Network(
        TransportFailure::new(TransportFailureKind::Timeout, "slow"),
    ));
    let server = ClassifiedOutcome::RetryableFailure(FailureReason::Status {
        status: HttpStatusCode(500),
        code: None,
        message: String::from("Server error"),
    });
    let fatal = ClassifiedOutcome::FatalFailure(FailureReason::Cancelled);
    let expired = ClassifiedOutcome::AuthExpired {
        server_message: None,
    };

    for outcome in [&connect, &timeout, &server] {
        assert!(is_retry_eligible(outcome, true));
    }
    assert!(is_retry_eligible(&connect, false));
    assert!(!is_retry_eligible(&timeout, false));
    assert!(!is_retry_eligible(&server, false));
    assert!(!is_retry_eligible(&fatal, true));
    assert!(!is_retry_eligible(&expired, true));
}

// ============================================
// PIPELINE BEHAVIOR
// ============================================

#[tokio::test]
async fn given_persistent_server_error_when_sent_then_attempted_three_times() {
    // GIVEN: A server that always answers 503
    let (transport, log) = FakeTransport::new(|_| respond(503, json!({})));
    let (pipeline, recorder) = pipeline_with(transport, None);

    // WHEN: An idempotent GET is sent
    let result = pipeline
        .send(&RequestDescriptor::get("divination/stats"))
        .await;

    // THEN: Three attempts, two scheduled retries, and a server error
    assert_eq!(log.count("divination/stats"), 3);
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::RetryScheduled { .. })),
        2
    );
    let error = result.expect_err("should fail after retries");
    assert_eq!(error.status(), Some(HttpStatusCode(503)));
    assert_eq!(error.user_message(), "Service temporarily unavailable");
}

#[tokio::test]
async fn given_transient_failure_when_sent_then_recovers_on_retry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let (transport, _log) = FakeTransport::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            fail(TransportFailureKind::Timeout)
        } else {
            ok_envelope(json!({ "total": 4 }))
        }
    });
    let (pipeline, _recorder) = pipeline_with(transport, None);

    let payload = pipeline
        .send(&RequestDescriptor::get("divination/stats"))
        .await
        .expect("second attempt succeeds");

    assert_eq!(payload, json!({ "total": 4 }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// **VALUE**: A business error is final on the first attempt, even on a 5xx-free
/// path and even for idempotent requests.
#[tokio::test]
async fn given_business_error_when_sent_then_not_retried() {
    let (transport, log) = FakeTransport::new(|_| {
        respond(
            200,
            json!({ "success": false, "error": { "code": "FREE_QUOTA_EXCEEDED", "message": "quota used up" } }),
        )
    });
    let (pipeline, _recorder) = pipeline_with(transport, None);

    let error = pipeline
        .send(&RequestDescriptor::get("user/divination-count"))
        .await
        .expect_err("business error surfaces");

    assert_eq!(log.count("user/divination-count"), 1);
    assert!(matches!(error, PipelineError::Business { .. }));
    assert_eq!(error.user_message(), "quota used up");
}

#[tokio::test]
async fn given_mutating_request_when_server_errors_then_not_retried() {
    let (transport, log) = FakeTransport::new(|_| respond(500, json!({})));
    let (pipeline, _recorder) = pipeline_with(transport, None);

    let result = pipeline
        .send(&RequestDescriptor::post("divination/start").with_json(json!({})))
        .await;

    assert!(result.is_err());
    assert_eq!(log.count("divination/start"), 1);
}

#[tokio::test]
async fn given_mutating_request_when_connection_refused_then_retried() {
    let (transport, log) = FakeTransport::new(|_| fail(TransportFailureKind::Connect));
    let (pipeline, _recorder) = pipeline_with(transport, None);

    let error = pipeline
        .send(&RequestDescriptor::post("divination/start").with_json(json!({})))
        .await
        .expect_err("never connects");

    assert_eq!(log.count("divination/start"), 3);
    assert!(matches!(
        error,
        PipelineError::Transport {
            kind: TransportFailureKind::Connect,
            ..
        }
    ));
}

#[tokio::test]
async fn given_idempotency_key_when_server_errors_then_retried() {
    let (transport, log) = FakeTransport::new(|_| respond(502, json!({})));
    let (pipeline, _recorder) = pipeline_with(transport, None);

    let _ = pipeline
        .send(&RequestDescriptor::post("divination/start").with_idempotency_key("k-1"))
        .await;

    assert_eq!(log.count("divination/start"), 3);
}
