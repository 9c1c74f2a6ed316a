//! Test helpers: an in-process transport with scripted answers.

use crate::config::ClientConfig;
use crate::context::ClientContext;
use crate::pipeline::{EventRecorder, Pipeline, RetryPolicy};
use crate::request::DecoratedRequest;
use crate::transport::{Transport, TransportFailure, TransportFailureKind, TransportOutcome, TransportResponse};

use common::RedactedToken;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

type Handler = Box<dyn Fn(&DecoratedRequest) -> TransportOutcome + Send + Sync>;

/// Every request the fake transport saw, in issue order.
#[derive(Clone, Default)]
pub(crate) struct RequestLog(Arc<Mutex<Vec<DecoratedRequest>>>);

impl RequestLog {
    pub(crate) fn all(&self) -> Vec<DecoratedRequest> {
        self.0.lock().expect("request log poisoned").clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.all()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }
}

pub(crate) struct FakeTransport {
    handler: Handler,
    delay: Duration,
    log: RequestLog,
}

impl FakeTransport {
    pub(crate) fn new(
        handler: impl Fn(&DecoratedRequest) -> TransportOutcome + Send + Sync + 'static,
    ) -> (Self, RequestLog) {
        let log = RequestLog::default();
        let transport = Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            log: log.clone(),
        };
        (transport, log)
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Transport for FakeTransport {
    async fn issue(&self, request: DecoratedRequest) -> TransportOutcome {
        self.log
            .0
            .lock()
            .expect("request log poisoned")
            .push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(&request)
    }
}

pub(crate) fn respond(status: u16, body: Value) -> TransportOutcome {
    Ok(TransportResponse::new(status, body.to_string()))
}

pub(crate) fn ok_envelope(data: Value) -> TransportOutcome {
    respond(200, json!({ "success": true, "data": data }))
}

pub(crate) fn fail(kind: TransportFailureKind) -> TransportOutcome {
    Err(TransportFailure::new(kind, format!("simulated {kind} failure")))
}

pub(crate) fn tokens_envelope(access: &str, refresh: &str) -> TransportOutcome {
    ok_envelope(json!({ "tokens": { "accessToken": access, "refreshToken": refresh } }))
}

/// Pipeline over `transport` with an in-memory store holding `tokens`
/// and millisecond backoff.
pub(crate) fn pipeline_with(
    transport: FakeTransport,
    tokens: Option<(&str, &str)>,
) -> (Pipeline<FakeTransport>, Arc<EventRecorder>) {
    let recorder = Arc::new(EventRecorder::new());
    let context = ClientContext::in_memory(ClientConfig::default()).with_observer(recorder.clone());
    if let Some((access, refresh)) = tokens {
        context
            .credentials()
            .set(RedactedToken::from(access), RedactedToken::from(refresh))
            .expect("memory store never fails");
    }
    let pipeline = Pipeline::with_retry_policy(
        transport,
        context,
        RetryPolicy::new(3, Duration::from_millis(1)),
    );
    (pipeline, recorder)
}
