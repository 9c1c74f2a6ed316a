use crate::error::PipelineError;
use crate::pipeline::{CancellationRegistry, PipelineEvent};
use crate::request::RequestDescriptor;
use crate::tests::support::{FakeTransport, ok_envelope, pipeline_with};

use std::time::Duration;

use serde_json::json;

fn page(page: u32) -> RequestDescriptor {
    RequestDescriptor::get("divination/history").with_query("page", page)
}

#[test]
fn given_registered_key_when_registered_again_then_previous_cancelled() {
    let registry = CancellationRegistry::new();

    let first = registry.register_and_supersede(page(1).key());
    assert!(!first.superseded_previous());

    let second = registry.register_and_supersede(page(1).key());

    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert!(second.superseded_previous());
    assert_eq!(registry.in_flight(), 1);
}

/// **VALUE**: A superseded request finishing late does not remove the entry
/// of the request that replaced it.
///
/// **BUG THIS CATCHES**: Key-only release. The late completion would delete
/// the live entry, and a third identical request would then fail to cancel
/// the second one.
#[test]
fn given_superseded_guard_when_dropped_late_then_live_entry_survives() {
    let registry = CancellationRegistry::new();
    let key = page(1).key();

    let stale = registry.register_and_supersede(key.clone());
    let live = registry.register_and_supersede(key.clone());
    drop(stale);

    assert!(registry.contains(&key));

    let third = registry.register_and_supersede(key.clone());
    assert!(live.is_cancelled());
    assert!(!third.is_cancelled());
}

#[test]
fn given_guard_when_dropped_then_entry_released() {
    let registry = CancellationRegistry::new();
    {
        let _guard = registry.register_and_supersede(page(1).key());
        assert_eq!(registry.in_flight(), 1);
    }
    assert_eq!(registry.in_flight(), 0);
}

#[test]
fn given_distinct_keys_when_registered_then_independent() {
    let registry = CancellationRegistry::new();
    let one = registry.register_and_supersede(page(1).key());
    let two = registry.register_and_supersede(page(2).key());

    assert!(!one.is_cancelled());
    assert!(!two.is_cancelled());
    assert_eq!(registry.in_flight(), 2);

    assert!(registry.cancel(&page(1).key()));
    assert!(one.is_cancelled());
    assert!(!registry.cancel(&page(1).key()));

    registry.cancel_all();
    assert!(two.is_cancelled());
    assert_eq!(registry.in_flight(), 0);
}

/// **VALUE**: Re-requesting the same page delivers only the newer result;
/// the older caller resolves as superseded.
///
/// **WHY THIS MATTERS**: Without this, a slow first response can arrive
/// after the second and overwrite fresher data on screen.
#[tokio::test]
async fn given_identical_request_in_flight_when_reissued_then_only_latest_delivers() {
    // GIVEN: A slow server
    let (transport, _log) = FakeTransport::new(|request| {
        ok_envelope(json!({ "requestId": request.request_id }))
    });
    let transport = transport.with_delay(Duration::from_millis(30));
    let (pipeline, recorder) = pipeline_with(transport, None);

    // WHEN: Page 1 is requested, then requested again before it resolves
    let descriptor = page(1);
    let first = pipeline.send_latest(&descriptor);
    let second = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        pipeline.send_latest(&descriptor).await
    };
    let (first, second) = tokio::join!(first, second);

    // THEN: The first is cancelled, the second carries data
    let error = first.expect_err("superseded");
    assert!(matches!(error, PipelineError::Cancelled { .. }));
    assert!(error.is_superseded());
    assert!(second.expect("latest delivers").get("requestId").is_some());
    assert_eq!(pipeline.in_flight(), 0);
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::Superseded { .. })),
        1
    );
}

#[tokio::test]
async fn given_different_pages_in_flight_when_sent_then_both_deliver() {
    let (transport, _log) =
        FakeTransport::new(|request| ok_envelope(json!({ "query": request.query })));
    let transport = transport.with_delay(Duration::from_millis(10));
    let (pipeline, _recorder) = pipeline_with(transport, None);

    let first = page(1);
    let second = page(2);
    let (one, two) = tokio::join!(pipeline.send_latest(&first), pipeline.send_latest(&second));

    assert!(one.is_ok());
    assert!(two.is_ok());
}
