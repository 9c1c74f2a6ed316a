use fortune_core::config::ClientConfig;
use fortune_core::pipeline::EventRecorder;
use fortune_core::{ClientContext, FortuneClient};

use common::RedactedToken;

use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::{MockServer, ResponseTemplate};

/// Client against `server` with a fast backoff and an in-memory store.
pub fn client_for(
    server: &MockServer,
    tokens: Option<(&str, &str)>,
) -> (FortuneClient, Arc<EventRecorder>) {
    let mut config = ClientConfig::default();
    config.api.base_url = format!("{}/api/", server.uri());
    config.api.timeout_secs = 5;
    config.retry.base_delay_ms = 1;

    let recorder = Arc::new(EventRecorder::new());
    let context = ClientContext::in_memory(config).with_observer(recorder.clone());
    if let Some((access, refresh)) = tokens {
        context
            .credentials()
            .set(RedactedToken::from(access), RedactedToken::from(refresh))
            .expect("memory store never fails");
    }

    let client = FortuneClient::connect(context).expect("valid base url");
    (client, recorder)
}

pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

pub fn failure(status: u16, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "success": false,
        "error": { "code": code, "message": message }
    }))
}

pub fn stats_payload(total: u64) -> Value {
    json!({ "total": total, "thisMonth": 1, "averageRating": 4.0 })
}
