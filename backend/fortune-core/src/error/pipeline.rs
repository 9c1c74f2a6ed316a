use crate::error::CredentialError;
use crate::transport::TransportFailureKind;

use common::{ErrorLocation, HttpStatusCode};
use models::{ApiErrorCode, ErrorDetail, ModelError};

use std::panic::Location;

use thiserror::Error as ThisError;

pub const NETWORK_LOST_MESSAGE: &str = "Network connection lost, please check your network settings";
pub const TIMEOUT_MESSAGE: &str = "Network request timed out, please check your connection";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please sign in again";
pub const CANCELLED_MESSAGE: &str = "Request was superseded";

/// Terminal outcome of a pipeline call.
///
/// `AuthExpired` and retryable failures never show up here while recovery is
/// still possible; what reaches the caller is final.
#[derive(Debug, ThisError)]
pub enum PipelineError {
    #[error("Transport Error ({kind}): {message} {location}")]
    Transport {
        kind: TransportFailureKind,
        message: String,
        location: ErrorLocation,
    },

    /// Retryable server status that ran out of attempts.
    #[error("Server Error ({status}): {message} {location}")]
    Server {
        status: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Business Error ({status}): {message} {location}")]
    Business {
        status: HttpStatusCode,
        code: Option<String>,
        message: String,
        details: Vec<ErrorDetail>,
        location: ErrorLocation,
    },

    /// Business error carrying field-level detail or a `VALIDATION_ERROR` code.
    #[error("Validation Error ({status}): {message} {location}")]
    Validation {
        status: HttpStatusCode,
        code: Option<String>,
        message: String,
        details: Vec<ErrorDetail>,
        location: ErrorLocation,
    },

    #[error("HTTP Error ({status}): {message} {location}")]
    Http {
        status: HttpStatusCode,
        code: Option<String>,
        message: String,
        location: ErrorLocation,
    },

    /// Still rejected after a refresh, or a 401 on a request that never refreshes.
    #[error("Unauthorized: {message} {location}")]
    Unauthorized {
        message: String,
        location: ErrorLocation,
    },

    /// The session could not be renewed; credentials were cleared.
    #[error("Authentication Required: {reason} {location}")]
    AuthRequired {
        reason: String,
        location: ErrorLocation,
    },

    #[error("Cancelled {location}")]
    Cancelled { location: ErrorLocation },

    #[error("Malformed Payload: {message} {location}")]
    MalformedPayload {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Input: {message} {location}")]
    InvalidInput {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },

    #[error("HTTP Client Error: {message} {location}")]
    HttpClient {
        message: String,
        location: ErrorLocation,
    },

    #[error("JSON Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },
}

impl PipelineError {
    #[track_caller]
    pub fn cancelled() -> Self {
        PipelineError::Cancelled {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn malformed(message: impl Into<String>) -> Self {
        PipelineError::MalformedPayload {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn auth_required(reason: impl Into<String>) -> Self {
        PipelineError::AuthRequired {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// The single message a UI should show.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Transport { kind, .. } => match kind {
                TransportFailureKind::Timeout => TIMEOUT_MESSAGE.to_string(),
                TransportFailureKind::Cancelled => CANCELLED_MESSAGE.to_string(),
                _ => NETWORK_LOST_MESSAGE.to_string(),
            },
            PipelineError::Server { message, .. }
            | PipelineError::Business { message, .. }
            | PipelineError::Validation { message, .. }
            | PipelineError::Http { message, .. }
            | PipelineError::Unauthorized { message, .. }
            | PipelineError::MalformedPayload { message, .. }
            | PipelineError::InvalidInput { message, .. } => message.clone(),
            PipelineError::AuthRequired { .. } => SESSION_EXPIRED_MESSAGE.to_string(),
            PipelineError::Cancelled { .. } => CANCELLED_MESSAGE.to_string(),
            PipelineError::Credential(error) => error.to_string(),
            PipelineError::UrlParse { message, .. }
            | PipelineError::HttpClient { message, .. }
            | PipelineError::Json { message, .. } => message.clone(),
        }
    }

    pub fn code(&self) -> Option<ApiErrorCode> {
        match self {
            PipelineError::Business { code, .. }
            | PipelineError::Validation { code, .. }
            | PipelineError::Http { code, .. } => code.as_deref().map(ApiErrorCode::parse),
            _ => None,
        }
    }

    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            PipelineError::Business { details, .. } | PipelineError::Validation { details, .. } => {
                details
            }
            _ => &[],
        }
    }

    pub fn status(&self) -> Option<HttpStatusCode> {
        match self {
            PipelineError::Server { status, .. }
            | PipelineError::Business { status, .. }
            | PipelineError::Validation { status, .. }
            | PipelineError::Http { status, .. } => Some(*status),
            PipelineError::Unauthorized { .. } => Some(HttpStatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// A newer identical request replaced this one. Not a failure to display.
    pub fn is_superseded(&self) -> bool {
        matches!(
            self,
            PipelineError::Cancelled { .. }
                | PipelineError::Transport {
                    kind: TransportFailureKind::Cancelled,
                    ..
                }
        )
    }

    /// The caller should send the user back to sign-in.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            PipelineError::AuthRequired { .. } | PipelineError::Unauthorized { .. }
        )
    }
}

impl From<url::ParseError> for PipelineError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        PipelineError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        PipelineError::HttpClient {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ModelError> for PipelineError {
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::Validation { message, location } => {
                PipelineError::InvalidInput { message, location }
            }
        }
    }
}
