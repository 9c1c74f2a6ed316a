//! Attaches authentication, tracing and device headers to a descriptor.

use crate::credential::Credential;
use crate::request::RequestDescriptor;
use crate::FORTUNE_USER_AGENT;

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
pub const DEVICE_INFO_HEADER: &str = "X-Device-Info";

/// Client/device metadata sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub is_mobile: bool,
    pub user_agent: String,
    pub platform: String,
    pub client_version: String,
}

impl DeviceInfo {
    /// Metadata for the current process.
    pub fn detect() -> Self {
        Self {
            is_mobile: matches!(std::env::consts::OS, "android" | "ios"),
            user_agent: FORTUNE_USER_AGENT.to_string(),
            platform: std::env::consts::OS.to_string(),
            client_version: crate::FORTUNE_CLIENT_VERSION.to_string(),
        }
    }

    pub fn header_value(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::detect()
    }
}

/// A fully-addressed request ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedRequest {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl DecoratedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build the outgoing request for one attempt.
///
/// `Authorization` is attached only when the access token is non-empty.
/// Decorator headers replace same-named descriptor headers.
pub fn decorate(
    descriptor: &RequestDescriptor,
    credential: &Credential,
    device: &DeviceInfo,
) -> DecoratedRequest {
    let request_id = Uuid::new_v4().to_string();

    let mut headers: Vec<(String, String)> = descriptor
        .headers()
        .iter()
        .filter(|(name, _)| !is_reserved(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    if !credential.access_token.is_empty() {
        headers.push((
            AUTHORIZATION_HEADER.to_string(),
            format!("Bearer {}", credential.access_token.expose().trim()),
        ));
    }
    headers.push((REQUEST_ID_HEADER.to_string(), request_id.clone()));
    headers.push((DEVICE_INFO_HEADER.to_string(), device.header_value()));

    DecoratedRequest {
        request_id,
        method: descriptor.method().clone(),
        path: descriptor.path().to_string(),
        query: descriptor
            .query()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        headers,
        body: descriptor.body().cloned(),
        timeout: descriptor.timeout(),
    }
}

fn is_reserved(name: &str) -> bool {
    [AUTHORIZATION_HEADER, REQUEST_ID_HEADER, DEVICE_INFO_HEADER]
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}
