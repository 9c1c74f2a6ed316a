use crate::error::PipelineError;
use crate::request::DecoratedRequest;
use crate::transport::{
    Transport, TransportFailure, TransportFailureKind, TransportOutcome, TransportResponse,
};

use common::HttpStatusCode;

use std::time::Duration;

use log::trace;
use reqwest::Client;
use url::Url;

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: Client,
}

impl HttpTransport {
    /// `default_timeout` applies to requests whose descriptor sets none.
    pub fn new(base_url_str: &str, default_timeout: Duration) -> Result<Self, PipelineError> {
        // `Url::join` replaces the last segment unless the base ends with '/'.
        let mut base_url = Url::parse(base_url_str)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(default_timeout).build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &DecoratedRequest) -> Result<Url, TransportFailure> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| TransportFailure::new(TransportFailureKind::Request, e.to_string()))?;

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn issue(&self, request: DecoratedRequest) -> TransportOutcome {
        let url = self.url_for(&request)?;
        trace!("{} {url} [{}]", request.method, request.request_id);

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| failure_from(&e))?;

        let status = HttpStatusCode(response.status().as_u16());
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| failure_from(&e))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Categorize a reqwest error BEFORE converting it to a string.
fn failure_from(error: &reqwest::Error) -> TransportFailure {
    let kind = if error.is_timeout() {
        TransportFailureKind::Timeout
    } else if error.is_connect() {
        TransportFailureKind::Connect
    } else if error.is_builder() {
        TransportFailureKind::Request
    } else {
        TransportFailureKind::Network
    };

    TransportFailure::new(kind, error.to_string())
}
