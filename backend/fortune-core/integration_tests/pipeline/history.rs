use crate::support::{client_for, envelope};

use fortune_core::pipeline::PipelineEvent;

use models::HistoryQuery;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer};

fn history_payload(page: u32) -> serde_json::Value {
    json!({
        "divinations": [{ "id": format!("item-{page}"), "question": "q" }],
        "pagination": { "total": 25, "page": page, "limit": 10, "pages": 3 }
    })
}

/// **VALUE**: Re-requesting the same page delivers only the newest result.
///
/// **WHY THIS MATTERS**: Rapid pull-to-refresh must not render an older
/// response after a newer one.
///
/// **BUG THIS CATCHES**: The superseded call still resolving with data, or
/// the registry entry of the old call removing the new one.
#[tokio::test]
async fn given_same_page_requested_twice_when_in_flight_then_first_superseded() {
    // GIVEN: A slow history endpoint
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/divination/history"))
        .and(query_param("page", "1"))
        .respond_with(envelope(history_payload(1)).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;
    let (client, recorder) = client_for(&server, Some(("a", "r")));

    // WHEN: A second identical request starts while the first is in flight
    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.history(&HistoryQuery::page(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = client.history(&HistoryQuery::page(1)).await;
    let first = first.await.expect("task joined");

    // THEN: Only the second delivers data
    let error = first.expect_err("first call was superseded");
    assert!(error.is_superseded(), "{error}");
    let page = second.expect("second call delivers");
    assert_eq!(page.items[0].id.as_deref(), Some("item-1"));
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::Superseded { .. })),
        1
    );
    assert_eq!(client.pipeline().in_flight(), 0);
}

#[tokio::test]
async fn given_page_query_when_history_requested_then_parameters_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/divination/history"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(query_param("sortBy", "createdAt"))
        .and(query_param("sortOrder", "desc"))
        .respond_with(envelope(history_payload(2)))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, Some(("a", "r")));

    let page = client.history(&HistoryQuery::page(2)).await.expect("page 2");

    assert_eq!(page.page, 2);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_more());
}
