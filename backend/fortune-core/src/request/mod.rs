//! Request descriptors and the keys that identify "the same logical request".

pub mod decorator;

pub use decorator::{DecoratedRequest, DeviceInfo, decorate};

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Identifies a logical request for supersession: method, path and query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to (re)build one API call.
///
/// Immutable once built: every attempt, retry or replay decorates a fresh
/// copy, so nothing attached for one attempt leaks into the next.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    body: Option<Value>,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    idempotent: bool,
    refresh_on_expiry: bool,
}

impl RequestDescriptor {
    /// Safe methods (GET, HEAD, OPTIONS) start out idempotent; everything else
    /// needs an explicit marker before it is retried automatically.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let idempotent = matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
            headers: BTreeMap::new(),
            timeout: None,
            idempotent,
            refresh_on_expiry: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    pub fn with_query_pairs<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        for (key, value) in pairs {
            self.query.insert(key.into(), value.to_string());
        }
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Mark a mutating request as safe to replay on transient failures.
    pub fn with_idempotency_key(self, key: impl Into<String>) -> Self {
        let mut descriptor = self.with_header(IDEMPOTENCY_KEY_HEADER, key);
        descriptor.idempotent = true;
        descriptor
    }

    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// A 401 on this request is final instead of triggering a token refresh.
    /// Used by the authentication endpoints themselves.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_expiry = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    pub fn refreshes_on_expiry(&self) -> bool {
        self.refresh_on_expiry
    }

    /// Query serialized as `a=1&b=2`, keys sorted.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish()
    }

    pub fn key(&self) -> RequestKey {
        let path = self.path.trim_start_matches('/');
        if self.query.is_empty() {
            RequestKey(format!("{} /{path}", self.method))
        } else {
            RequestKey(format!("{} /{path}?{}", self.method, self.query_string()))
        }
    }
}
