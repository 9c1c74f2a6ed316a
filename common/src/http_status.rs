//! HTTP status categorization used by the response classifier.

/// HTTP status code for error categorization.
///
/// Stored directly rather than parsed from error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    pub const UNAUTHORIZED: HttpStatusCode = HttpStatusCode(401);
    pub const FORBIDDEN: HttpStatusCode = HttpStatusCode(403);
    pub const NOT_FOUND: HttpStatusCode = HttpStatusCode(404);
    pub const TOO_MANY_REQUESTS: HttpStatusCode = HttpStatusCode(429);

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// 4xx client errors (not retryable).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx server errors.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// Transient failures: rate limiting and every 5xx.
    pub fn is_retryable(&self) -> bool {
        *self == Self::TOO_MANY_REQUESTS || self.is_server_error()
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        HttpStatusCode(code)
    }
}

impl std::fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
