//! The transport boundary: one HTTP exchange, nothing more.
//!
//! Retries, refresh and cancellation all live above this trait. A transport
//! only turns a [`DecoratedRequest`] into a [`TransportResponse`] or a
//! [`TransportFailure`]. Dropping the returned future aborts the exchange.

pub mod http;

pub use http::HttpTransport;

use crate::request::DecoratedRequest;

use common::HttpStatusCode;

use std::fmt;
use std::future::Future;

/// Why no response was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// Connection could not be established; nothing was sent.
    Connect,
    /// The per-attempt timeout elapsed.
    Timeout,
    /// Any other I/O failure after the request may have been sent.
    Network,
    /// The request could not be built (bad URL, invalid header).
    Request,
    /// Aborted on demand.
    Cancelled,
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportFailureKind::Connect => "connect",
            TransportFailureKind::Timeout => "timeout",
            TransportFailureKind::Network => "network",
            TransportFailureKind::Request => "request",
            TransportFailureKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: HttpStatusCode,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: impl Into<HttpStatusCode>, body: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub type TransportOutcome = Result<TransportResponse, TransportFailure>;

pub trait Transport: Send + Sync + 'static {
    fn issue(&self, request: DecoratedRequest) -> impl Future<Output = TransportOutcome> + Send;
}
