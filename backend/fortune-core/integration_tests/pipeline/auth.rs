use crate::support::{client_for, envelope, failure, stats_payload};

use fortune_core::error::PipelineError;
use fortune_core::pipeline::PipelineEvent;

use models::LoginRequest;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// **VALUE**: Login stores the returned token pair and later calls carry it.
#[tokio::test]
async fn given_valid_login_when_signed_in_then_tokens_stored_and_sent() {
    // GIVEN: A server accepting the credentials
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "identifier": "[email protected]",
            "password": "hunter22",
            "rememberMe": true
        })))
        .respond_with(envelope(json!({
            "user": { "id": 1, "email": "[email protected]" },
            "tokens": { "accessToken": "access-1", "refreshToken": "refresh-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(envelope(stats_payload(3)))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, None);

    // WHEN: Signing in, then reading stats
    let session = client
        .login(&LoginRequest {
            identifier: String::from("[email protected]"),
            password: String::from("hunter22"),
            remember_me: true,
        })
        .await
        .expect("login succeeds");
    let stats = client.stats().await.expect("stats with bearer");

    // THEN: Tokens were stored and used
    assert_eq!(session.tokens.access_token.expose(), "access-1");
    assert!(client.is_logged_in());
    assert_eq!(stats.total_divinations, 3);
}

/// **VALUE**: An expired access token is refreshed once and the call replays.
///
/// **WHY THIS MATTERS**: Users should never see a sign-in prompt just
/// because the short-lived access token ran out.
///
/// **BUG THIS CATCHES**: Several concurrent 401s each starting their own
/// refresh, invalidating each other's refresh tokens.
#[tokio::test]
async fn given_expired_token_when_concurrent_calls_then_single_refresh_and_replay() {
    // GIVEN: The old token is rejected, the new one accepted
    let server = MockServer::start().await;
    Mock::given(header("Authorization", "Bearer stale"))
        .respond_with(failure(401, "TOKEN_INVALID", "Token expired"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(envelope(json!({
            "tokens": { "accessToken": "fresh", "refreshToken": "refresh-2" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(envelope(stats_payload(7)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(envelope(json!({ "user": { "id": "u1", "email": "[email protected]" } })))
        .mount(&server)
        .await;
    let (client, recorder) = client_for(&server, Some(("stale", "refresh-1")));

    // WHEN: Two calls hit the expired token at the same time
    let (stats, profile) = tokio::join!(client.stats(), client.profile());

    // THEN: Both succeed after exactly one refresh
    assert_eq!(stats.expect("stats replayed").total_divinations, 7);
    assert_eq!(profile.expect("profile replayed").email, "[email protected]");
    let stored = client.pipeline().credentials().get();
    assert_eq!(stored.access_token.expose(), "fresh");
    assert_eq!(stored.refresh_token.expose(), "refresh-2");
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::RefreshStarted)),
        1
    );
}

/// **VALUE**: A rejected refresh logs the user out instead of looping.
///
/// **BUG THIS CATCHES**: Keeping dead tokens around, so every later call
/// repeats the 401 -> refresh -> 401 cycle.
#[tokio::test]
async fn given_refresh_rejected_when_call_expires_then_credentials_cleared() {
    // GIVEN: Both the access token and the refresh token are dead
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(failure(401, "TOKEN_INVALID", "Refresh token expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/divination/stats"))
        .respond_with(failure(401, "TOKEN_INVALID", "Token expired"))
        .expect(1)
        .mount(&server)
        .await;
    let (client, recorder) = client_for(&server, Some(("stale", "dead")));

    // WHEN: A call hits the expired token
    let error = client.stats().await.expect_err("session is gone");

    // THEN: The caller is sent to sign-in and nothing is stored anymore
    assert!(matches!(error, PipelineError::AuthRequired { .. }), "{error}");
    assert!(error.requires_login());
    assert!(!client.is_logged_in());
    assert_eq!(
        recorder.count(|event| matches!(event, PipelineEvent::SessionExpired { .. })),
        1
    );
}

#[tokio::test]
async fn given_wrong_password_when_login_then_server_message_without_refresh() {
    // GIVEN: The server rejects the credentials with 401
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(failure(401, "INVALID_CREDENTIALS", "Wrong email or password"))
        .mount(&server)
        .await;
    Mock::given(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, None);

    // WHEN: Signing in
    let error = client
        .login(&LoginRequest {
            identifier: String::from("[email protected]"),
            password: String::from("nope"),
            remember_me: false,
        })
        .await
        .expect_err("rejected");

    // THEN: The server's message is surfaced as-is
    assert!(matches!(error, PipelineError::Unauthorized { .. }), "{error}");
    assert_eq!(error.user_message(), "Wrong email or password");
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn given_signed_in_when_logout_then_server_told_and_store_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(envelope(json!(null)))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _) = client_for(&server, Some(("access-1", "refresh-1")));

    client.logout().await.expect("logout");

    assert!(!client.is_logged_in());
}
