//! Turns one completed exchange into exactly one [`ClassifiedOutcome`].
//!
//! The HTTP status is authoritative for transport-level decisions
//! (401/403/404/429/5xx). Within 2xx the envelope's `success` flag decides.

use crate::error::PipelineError;
use crate::transport::{TransportFailure, TransportFailureKind, TransportOutcome};

use common::{ErrorLocation, HttpStatusCode};
use models::{ApiErrorCode, Envelope, ErrorDetail};

use std::panic::Location;

use serde_json::Value;

pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request";
pub const PERMISSION_DENIED_MESSAGE: &str = "Permission denied";
pub const NOT_FOUND_MESSAGE: &str = "Resource not found";
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests, please try again later";
pub const SERVER_ERROR_MESSAGE: &str = "Server error";
pub const BAD_GATEWAY_MESSAGE: &str = "Bad gateway";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable";

/// A well-formed rejection from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    pub status: HttpStatusCode,
    pub code: Option<String>,
    pub message: String,
    pub details: Vec<ErrorDetail>,
}

impl ApiFailure {
    fn from_envelope(status: HttpStatusCode, envelope: &Envelope) -> Self {
        Self {
            status,
            code: envelope.error_code().map(str::to_string),
            message: failure_message(envelope).to_string(),
            details: envelope.details().to_vec(),
        }
    }

    pub fn is_validation(&self) -> bool {
        self.code.as_deref() == Some(ApiErrorCode::ValidationError.as_str())
            || self.details.iter().any(|detail| detail.text().is_some())
    }

    #[track_caller]
    pub fn into_error(self) -> PipelineError {
        let location = ErrorLocation::from(Location::caller());
        if self.is_validation() {
            PipelineError::Validation {
                status: self.status,
                code: self.code,
                message: self.message,
                details: self.details,
                location,
            }
        } else {
            PipelineError::Business {
                status: self.status,
                code: self.code,
                message: self.message,
                details: self.details,
                location,
            }
        }
    }
}

/// Why an attempt failed without a usable payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// No response was obtained.
    Network(TransportFailure),
    /// The server answered with a status we don't process.
    Status {
        status: HttpStatusCode,
        code: Option<String>,
        message: String,
    },
    /// A 2xx whose body is not JSON.
    MalformedPayload(String),
    Cancelled,
}

impl FailureReason {
    pub fn message(&self) -> &str {
        match self {
            FailureReason::Network(failure) => &failure.message,
            FailureReason::Status { message, .. } => message,
            FailureReason::MalformedPayload(message) => message,
            FailureReason::Cancelled => "cancelled",
        }
    }

    #[track_caller]
    pub fn into_error(self) -> PipelineError {
        let location = ErrorLocation::from(Location::caller());
        match self {
            FailureReason::Network(failure) => PipelineError::Transport {
                kind: failure.kind,
                message: failure.message,
                location,
            },
            FailureReason::Status {
                status,
                code: _,
                message,
            } if status.is_retryable() => PipelineError::Server {
                status,
                message,
                location,
            },
            FailureReason::Status {
                status,
                code,
                message,
            } => PipelineError::Http {
                status,
                code,
                message,
                location,
            },
            FailureReason::MalformedPayload(message) => {
                PipelineError::MalformedPayload { message, location }
            }
            FailureReason::Cancelled => PipelineError::Cancelled { location },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedOutcome {
    /// The envelope's `data`, or the whole body for a legacy endpoint.
    Success(Value),
    BusinessError(ApiFailure),
    AuthExpired { server_message: Option<String> },
    RetryableFailure(FailureReason),
    FatalFailure(FailureReason),
}

impl ClassifiedOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifiedOutcome::RetryableFailure(_))
    }
}

/// Classify a transport outcome. Total: every input maps to one variant.
pub fn classify(outcome: &TransportOutcome) -> ClassifiedOutcome {
    let response = match outcome {
        Ok(response) => response,
        Err(failure) if failure.kind == TransportFailureKind::Cancelled => {
            return ClassifiedOutcome::FatalFailure(FailureReason::Cancelled);
        }
        Err(failure) if failure.kind == TransportFailureKind::Request => {
            return ClassifiedOutcome::FatalFailure(FailureReason::Network(failure.clone()));
        }
        Err(failure) => {
            return ClassifiedOutcome::RetryableFailure(FailureReason::Network(failure.clone()));
        }
    };

    let status = response.status;
    let body = parse_body(&response.body);

    if status == HttpStatusCode::UNAUTHORIZED {
        let server_message = body
            .as_ref()
            .and_then(|body| body.as_ref().ok())
            .and_then(server_message);
        return ClassifiedOutcome::AuthExpired { server_message };
    }

    if status == HttpStatusCode::FORBIDDEN {
        return fatal_status(status, body.as_ref(), PERMISSION_DENIED_MESSAGE);
    }
    if status == HttpStatusCode::NOT_FOUND {
        return fatal_status(status, body.as_ref(), NOT_FOUND_MESSAGE);
    }

    if status.is_retryable() {
        let message = match status.as_u16() {
            429 => TOO_MANY_REQUESTS_MESSAGE,
            502 => BAD_GATEWAY_MESSAGE,
            503 => SERVICE_UNAVAILABLE_MESSAGE,
            _ => SERVER_ERROR_MESSAGE,
        };
        return ClassifiedOutcome::RetryableFailure(FailureReason::Status {
            status,
            code: None,
            message: message.to_string(),
        });
    }

    if status.is_success() {
        return match body {
            None => ClassifiedOutcome::Success(Value::Null),
            Some(Err(reason)) => {
                ClassifiedOutcome::FatalFailure(FailureReason::MalformedPayload(reason))
            }
            Some(Ok(value)) => match Envelope::detect(&value) {
                Some(envelope) if envelope.is_failure() => {
                    ClassifiedOutcome::BusinessError(ApiFailure::from_envelope(status, &envelope))
                }
                Some(envelope) => ClassifiedOutcome::Success(envelope.data.unwrap_or(Value::Null)),
                None => ClassifiedOutcome::Success(value),
            },
        };
    }

    if status.is_client_error() {
        if let Some(Ok(value)) = &body
            && let Some(envelope) = Envelope::detect(value)
            && envelope.is_failure()
        {
            return ClassifiedOutcome::BusinessError(ApiFailure::from_envelope(status, &envelope));
        }
        let message = body
            .as_ref()
            .and_then(|body| body.as_ref().ok())
            .and_then(server_message)
            .unwrap_or_else(|| INVALID_REQUEST_MESSAGE.to_string());
        return ClassifiedOutcome::FatalFailure(FailureReason::Status {
            status,
            code: None,
            message,
        });
    }

    ClassifiedOutcome::FatalFailure(FailureReason::Status {
        status,
        code: None,
        message: format!("{GENERIC_FAILURE_MESSAGE} (status {status})"),
    })
}

/// First validation-detail text, else `error.message`, else top-level
/// `message`, else the generic message.
pub fn failure_message(envelope: &Envelope) -> &str {
    let error_message = envelope
        .error
        .as_ref()
        .and_then(|error| error.message.as_deref());

    envelope
        .details()
        .iter()
        .find_map(ErrorDetail::text)
        .into_iter()
        .chain(error_message)
        .chain(envelope.message.as_deref())
        .map(str::trim)
        .find(|message| !message.is_empty())
        .unwrap_or(GENERIC_FAILURE_MESSAGE)
}

/// `None` for an empty body, `Err` for a body that is not JSON.
fn parse_body(body: &str) -> Option<Result<Value, String>> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).map_err(|e| format!("Response is not valid JSON: {e}")))
}

fn server_message(body: &Value) -> Option<String> {
    match Envelope::detect(body) {
        Some(envelope) => {
            let message = failure_message(&envelope);
            (message != GENERIC_FAILURE_MESSAGE).then(|| message.to_string())
        }
        None => body
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string),
    }
}

fn fatal_status(
    status: HttpStatusCode,
    body: Option<&Result<Value, String>>,
    message: &str,
) -> ClassifiedOutcome {
    let code = body
        .and_then(|body| body.as_ref().ok())
        .and_then(Envelope::detect)
        .and_then(|envelope| envelope.error_code().map(str::to_string));
    ClassifiedOutcome::FatalFailure(FailureReason::Status {
        status,
        code,
        message: message.to_string(),
    })
}
