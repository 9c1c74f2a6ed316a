use crate::support::{client_for, envelope, stats_payload};

use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer};

/// **VALUE**: Every request reaches the server with tracing and device
/// headers, and without `Authorization` when logged out.
///
/// **BUG THIS CATCHES**: Sending `Authorization: Bearer ` with an empty
/// token, which some servers treat as a malformed (not missing) token.
#[tokio::test]
async fn given_logged_out_client_when_request_sent_then_decorated_without_bearer() {
    // GIVEN: A server recording requests
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .and(header_exists("X-Request-ID"))
        .and(header_exists("X-Device-Info"))
        .respond_with(envelope(stats_payload(0)))
        .expect(2)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, None);

    // WHEN: Sending two requests
    client.stats().await.expect("first");
    client.stats().await.expect("second");

    // THEN: Request ids differ, device info is JSON, no bearer was sent
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
    let ids: Vec<&str> = requests
        .iter()
        .map(|request| {
            request
                .headers
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .expect("request id")
        })
        .collect();
    assert_ne!(ids[0], ids[1]);

    for request in &requests {
        assert!(request.headers.get("authorization").is_none());
        let device = request
            .headers
            .get("x-device-info")
            .and_then(|value| value.to_str().ok())
            .expect("device info");
        let device: serde_json::Value = serde_json::from_str(device).expect("device info is JSON");
        assert!(device.get("clientVersion").is_some(), "{device}");
    }
}
