// Unit tests for the single-flight refresh coordinator, standalone and
// inside the pipeline.

use crate::error::PipelineError;
use crate::pipeline::{PipelineEvent, REFRESH_ENDPOINT, RefreshCoordinator, RefreshSettlement};
use crate::request::RequestDescriptor;
use crate::request::decorator::AUTHORIZATION_HEADER;
use crate::tests::support::{
    FakeTransport, fail, ok_envelope, pipeline_with, respond, tokens_envelope,
};
use crate::transport::TransportFailureKind;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

// ============================================
// COORDINATOR STATE MACHINE
// ============================================

#[test]
fn given_idle_coordinator_when_enqueued_then_first_caller_leads_and_rest_wait() {
    let coordinator = RefreshCoordinator::new();

    let first = coordinator.enqueue(0);
    let second = coordinator.enqueue(0);
    let third = coordinator.enqueue(0);

    assert!(first.is_leader);
    assert!(!second.is_leader);
    assert!(!third.is_leader);
    assert!(coordinator.is_refreshing());
    assert_eq!(coordinator.waiting(), 3);
    assert_eq!(coordinator.refresh_count(), 1);
}

/// **VALUE**: Settling releases every waiter with the same outcome and
/// returns the coordinator to idle.
///
/// **BUG THIS CATCHES**: A coordinator stuck in `Refreshing` would queue
/// every future 401 forever.
#[tokio::test]
async fn given_waiters_when_settled_then_all_released_and_idle_again() {
    let coordinator = RefreshCoordinator::new();
    let tickets: Vec<_> = (0..3).map(|_| coordinator.enqueue(0)).collect();

    let released = coordinator.settle(RefreshSettlement::Refreshed);

    assert_eq!(released, 3);
    assert!(!coordinator.is_refreshing());
    for ticket in tickets {
        assert_eq!(
            ticket.receiver.await.expect("settled"),
            RefreshSettlement::Refreshed
        );
    }

    assert_eq!(coordinator.generation(), 1);
    let next = coordinator.enqueue(coordinator.generation());
    assert!(next.is_leader);
    assert_eq!(coordinator.refresh_count(), 2);
}

#[tokio::test]
async fn given_dropped_waiter_when_settled_then_others_still_released() {
    let coordinator = RefreshCoordinator::new();
    let kept = coordinator.enqueue(0);
    drop(coordinator.enqueue(0));

    let released = coordinator.settle(RefreshSettlement::Failed {
        reason: String::from("rejected"),
    });

    assert_eq!(released, 2);
    assert_eq!(
        kept.receiver.await.expect("settled"),
        RefreshSettlement::Failed {
            reason: String::from("rejected")
        }
    );
}

/// **VALUE**: Settling wakes waiters in the order they joined the queue.
///
/// **WHY THIS MATTERS**: Replays must go out in arrival order. A user who
/// clicked "save" before "reload" expects the save to land first.
///
/// **BUG THIS CATCHES**: Draining the queue from the back, or releasing
/// waiters from an unordered collection.
#[tokio::test]
async fn given_queued_waiters_when_settled_then_released_in_arrival_order() {
    // GIVEN: Three waiters, each recording itself once released
    let coordinator = RefreshCoordinator::new();
    let released = Arc::new(Mutex::new(Vec::new()));
    let tickets: Vec<_> = (0..3).map(|_| coordinator.enqueue(0)).collect();

    // Spawned in reverse so wake order, not spawn order, decides the result
    let mut handles = Vec::new();
    for (index, ticket) in tickets.into_iter().enumerate().rev() {
        let released = Arc::clone(&released);
        handles.push(tokio::spawn(async move {
            ticket.receiver.await.expect("settled");
            released.lock().expect("poisoned").push(index);
        }));
    }
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }

    // WHEN
    coordinator.settle(RefreshSettlement::Refreshed);
    for handle in handles {
        handle.await.expect("waiter task");
    }

    // THEN
    assert_eq!(*released.lock().expect("poisoned"), vec![0, 1, 2]);
}

/// **VALUE**: A 401 that arrives after a refresh already succeeded replays
/// immediately instead of starting a second refresh.
///
/// **BUG THIS CATCHES**: Comparing tokens outside the coordinator lock, which
/// lets a late request spend the single-use refresh token a second time.
#[tokio::test]
async fn given_refresh_completed_since_request_issued_when_enqueued_then_replays_without_refresh() {
    // GIVEN: A request issued at generation 0, then a refresh that succeeds
    let coordinator = RefreshCoordinator::new();
    let seen = coordinator.generation();
    let leader = coordinator.enqueue(seen);
    coordinator.settle(RefreshSettlement::Refreshed);
    assert_eq!(leader.receiver.await.expect("settled"), RefreshSettlement::Refreshed);

    // WHEN: The late 401 enqueues with the old generation
    let late = coordinator.enqueue(seen);

    // THEN: Already settled, nobody queued, no new refresh
    assert!(!late.is_leader);
    assert_eq!(late.receiver.await.expect("settled"), RefreshSettlement::Refreshed);
    assert!(!coordinator.is_refreshing());
    assert_eq!(coordinator.waiting(), 0);
    assert_eq!(coordinator.refresh_count(), 1);
}

// ============================================
// PIPELINE INTEGRATION
// ============================================

/// **VALUE**: Two concurrent requests hitting an expired token cause exactly
/// one refresh, and both succeed after it.
///
/// **WHY THIS MATTERS**: Refresh tokens are commonly single-use. A second
/// concurrent refresh would invalidate the first one's result and log the
/// user out.
///
/// **BUG THIS CATCHES**: Check-then-enqueue race in the coordinator, or the
/// second 401 starting its own refresh.
#[tokio::test]
async fn given_concurrent_expired_requests_when_sent_then_single_refresh_and_both_replay() {
    // GIVEN: The server accepts only "fresh" and refreshes slowly
    let (transport, log) = FakeTransport::new(|request| {
        if request.path == REFRESH_ENDPOINT {
            return tokens_envelope("fresh", "refresh-2");
        }
        match request.header(AUTHORIZATION_HEADER) {
            Some("Bearer fresh") => ok_envelope(json!({ "path": request.path })),
            _ => respond(401, json!({ "success": false, "error": { "code": "TOKEN_INVALID" } })),
        }
    });
    let transport = transport.with_delay(Duration::from_millis(20));
    let (pipeline, recorder) = pipeline_with(transport, Some(("stale", "refresh-1")));

    // WHEN: Two requests are sent concurrently
    let stats = RequestDescriptor::get("divination/stats");
    let profile = RequestDescriptor::get("user/profile");
    let (first, second) = tokio::join!(pipeline.send(&stats), pipeline.send(&profile));

    // THEN: One refresh call, both callers see only the final success
    assert_eq!(first.expect("stats replayed"), json!({ "path": "divination/stats" }));
    assert_eq!(second.expect("profile replayed"), json!({ "path": "user/profile" }));
    assert_eq!(log.count(REFRESH_ENDPOINT), 1);
    assert_eq!(log.count("divination/stats"), 2);
    assert_eq!(log.count("user/profile"), 2);
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::RefreshStarted)),
        1
    );

    let stored = pipeline.credentials().get();
    assert_eq!(stored.access_token.expose(), "fresh");
    assert_eq!(stored.refresh_token.expose(), "refresh-2");
}

/// **VALUE**: Requests rejected while a refresh is running are replayed in
/// the order they were rejected.
///
/// **WHY THIS MATTERS**: Callers issue dependent writes back to back. Replaying
/// them out of order after a token refresh would reorder side effects on the
/// server.
///
/// **BUG THIS CATCHES**: Waiters released LIFO, or replays racing each other
/// in an unspecified order.
#[tokio::test]
async fn given_requests_rejected_during_slow_refresh_when_settled_then_replayed_in_fifo_order() {
    // GIVEN: Every exchange takes 40ms, so the refresh is still running when
    // the second and third requests are rejected
    let (transport, log) = FakeTransport::new(|request| {
        if request.path == REFRESH_ENDPOINT {
            return tokens_envelope("fresh", "refresh-2");
        }
        match request.header(AUTHORIZATION_HEADER) {
            Some("Bearer fresh") => ok_envelope(json!({ "path": request.path })),
            _ => respond(401, json!({ "success": false, "error": { "code": "TOKEN_INVALID" } })),
        }
    });
    let transport = transport.with_delay(Duration::from_millis(40));
    let (pipeline, _recorder) = pipeline_with(transport, Some(("stale", "refresh-1")));

    // WHEN: Three requests start 10ms apart
    let mut handles = Vec::new();
    for path in ["orders/first", "orders/second", "orders/third"] {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline.send(&RequestDescriptor::get(path)).await
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    for handle in handles {
        handle.await.expect("request task").expect("replayed after refresh");
    }

    // THEN: One refresh, replays logged in rejection order
    assert_eq!(log.count(REFRESH_ENDPOINT), 1);
    let replayed: Vec<_> = log
        .all()
        .into_iter()
        .filter(|request| request.path != REFRESH_ENDPOINT)
        .filter(|request| request.header(AUTHORIZATION_HEADER) == Some("Bearer fresh"))
        .map(|request| request.path)
        .collect();
    assert_eq!(replayed, vec!["orders/first", "orders/second", "orders/third"]);
}

#[tokio::test]
async fn given_refresh_request_when_sent_then_carries_refresh_token_and_no_bearer() {
    let (transport, log) = FakeTransport::new(|request| {
        if request.path == REFRESH_ENDPOINT {
            return tokens_envelope("fresh", "refresh-2");
        }
        match request.header(AUTHORIZATION_HEADER) {
            Some("Bearer fresh") => ok_envelope(json!({})),
            _ => respond(401, json!({})),
        }
    });
    let (pipeline, _recorder) = pipeline_with(transport, Some(("stale", "refresh-1")));

    pipeline
        .send(&RequestDescriptor::get("divination/stats"))
        .await
        .expect("replayed after refresh");

    let refresh = log
        .all()
        .into_iter()
        .find(|request| request.path == REFRESH_ENDPOINT)
        .expect("refresh issued");
    assert_eq!(refresh.header(AUTHORIZATION_HEADER), None);
    assert_eq!(refresh.body, Some(json!({ "refreshToken": "refresh-1" })));
}

#[tokio::test]
async fn given_refresh_response_without_refresh_token_when_refreshed_then_old_one_kept() {
    let (transport, _log) = FakeTransport::new(|request| {
        if request.path == REFRESH_ENDPOINT {
            return ok_envelope(json!({ "tokens": { "accessToken": "fresh" } }));
        }
        match request.header(AUTHORIZATION_HEADER) {
            Some("Bearer fresh") => ok_envelope(json!({})),
            _ => respond(401, json!({})),
        }
    });
    let (pipeline, _recorder) = pipeline_with(transport, Some(("stale", "refresh-1")));

    pipeline
        .send(&RequestDescriptor::get("divination/stats"))
        .await
        .expect("replayed after refresh");

    let stored = pipeline.credentials().get();
    assert_eq!(stored.access_token.expose(), "fresh");
    assert_eq!(stored.refresh_token.expose(), "refresh-1");
}

/// **VALUE**: A failed refresh logs the user out and every waiter gets an
/// authentication-required error, never the raw transport error.
///
/// **WHY THIS MATTERS**: The UI redirects to sign-in on `requires_login()`.
/// Surfacing "network error" instead would leave the user stuck on a page
/// that can never load.
#[tokio::test]
async fn given_refresh_network_failure_when_waiting_then_auth_required_and_store_cleared() {
    let (transport, _log) = FakeTransport::new(|request| {
        if request.path == REFRESH_ENDPOINT {
            return fail(TransportFailureKind::Network);
        }
        respond(401, json!({}))
    });
    let transport = transport.with_delay(Duration::from_millis(10));
    let (pipeline, recorder) = pipeline_with(transport, Some(("stale", "refresh-1")));

    let stats = RequestDescriptor::get("divination/stats");
    let history = RequestDescriptor::get("divination/history");
    let (first, second) = tokio::join!(pipeline.send(&stats), pipeline.send(&history));

    for result in [first, second] {
        let error = result.expect_err("refresh failed");
        assert!(
            matches!(error, PipelineError::AuthRequired { .. }),
            "{error:?}"
        );
        assert!(error.requires_login());
    }
    assert!(!pipeline.credentials().get().is_logged_in());
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::SessionExpired { .. })),
        1
    );
}

#[tokio::test]
async fn given_no_refresh_token_when_expired_then_auth_required_without_refresh_call() {
    let (transport, log) = FakeTransport::new(|_| respond(401, json!({})));
    let (pipeline, _recorder) = pipeline_with(transport, Some(("stale", "")));

    let error = pipeline
        .send(&RequestDescriptor::get("divination/stats"))
        .await
        .expect_err("cannot refresh");

    assert!(matches!(error, PipelineError::AuthRequired { .. }));
    assert_eq!(log.count(REFRESH_ENDPOINT), 0);
}

/// **VALUE**: A replayed request that is rejected again is final.
///
/// **BUG THIS CATCHES**: Infinite refresh loops when the server keeps
/// rejecting freshly issued tokens.
#[tokio::test]
async fn given_replay_rejected_again_when_sent_then_unauthorized_after_one_refresh() {
    let (transport, log) = FakeTransport::new(|request| {
        if request.path == REFRESH_ENDPOINT {
            return tokens_envelope("fresh", "refresh-2");
        }
        respond(
            401,
            json!({ "success": false, "error": { "message": "account locked" } }),
        )
    });
    let (pipeline, _recorder) = pipeline_with(transport, Some(("stale", "refresh-1")));

    let error = pipeline
        .send(&RequestDescriptor::get("user/profile"))
        .await
        .expect_err("still rejected");

    assert!(matches!(error, PipelineError::Unauthorized { .. }));
    assert_eq!(error.user_message(), "account locked");
    assert_eq!(log.count(REFRESH_ENDPOINT), 1);
    assert_eq!(log.count("user/profile"), 2);
}

#[tokio::test]
async fn given_descriptor_without_refresh_when_401_then_unauthorized_immediately() {
    let (transport, log) = FakeTransport::new(|_| {
        respond(
            401,
            json!({ "success": false, "message": "Wrong password" }),
        )
    });
    let (pipeline, _recorder) = pipeline_with(transport, None);

    let error = pipeline
        .send(&RequestDescriptor::post("auth/login").without_refresh())
        .await
        .expect_err("bad credentials");

    assert_eq!(error.user_message(), "Wrong password");
    assert_eq!(log.count(REFRESH_ENDPOINT), 0);
}
