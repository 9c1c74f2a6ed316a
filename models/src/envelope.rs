//! The server's response envelope.
//!
//! Every endpoint wraps its body as
//! `{ success, data?, message?, error?: { code, message, details? } }`.
//! Legacy endpoints may return a bare body, which is why detection is explicit
//! (see [`Envelope::detect`]).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const SUCCESS_KEY: &str = "success";
const ERROR_KEY: &str = "error";

/// The envelope as it appears on the wire.
///
/// Every field is read leniently: a value of the wrong type becomes `None`
/// (numeric codes become strings) instead of failing the whole envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_error")]
    pub error: Option<ErrorBody>,
    /// Older endpoints put the code at the top level.
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: Option<String>,
}

impl Envelope {
    /// Interpret `body` as an envelope if it carries a boolean `success` flag
    /// or an `error` object. Anything else is a legacy bare payload.
    ///
    /// Once the marker is found the result is always `Some`, whatever the
    /// types of the remaining fields.
    pub fn detect(body: &Value) -> Option<Envelope> {
        let object = body.as_object()?;
        let has_flag = object.get(SUCCESS_KEY).is_some_and(Value::is_boolean);
        let has_error = object.get(ERROR_KEY).is_some_and(Value::is_object);
        if !has_flag && !has_error {
            return None;
        }
        Some(Envelope::deserialize(body).unwrap_or_else(|_| Envelope {
            success: object.get(SUCCESS_KEY).and_then(Value::as_bool),
            error: has_error.then(ErrorBody::default),
            ..Envelope::default()
        }))
    }

    /// `success: false`, or an error object without an explicit flag.
    pub fn is_failure(&self) -> bool {
        match self.success {
            Some(flag) => !flag,
            None => self.error.is_some(),
        }
    }

    /// Error code from `error.code`, falling back to the top-level `code`.
    pub fn error_code(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|error| error.code.as_deref())
            .or(self.code.as_deref())
            .filter(|code| !code.is_empty())
    }

    pub fn details(&self) -> &[ErrorDetail] {
        self.error
            .as_ref()
            .map(|error| error.details.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_details")]
    pub details: Vec<ErrorDetail>,
}

/// One field-level validation failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, deserialize_with = "lenient_text")]
    pub msg: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(
        default,
        alias = "param",
        alias = "path",
        deserialize_with = "lenient_text"
    )]
    pub field: Option<String>,
}

impl ErrorDetail {
    /// `msg`, else `message`; blank strings count as absent.
    pub fn text(&self) -> Option<&str> {
        [self.msg.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_bool())
}

/// Strings pass through, numbers are rendered, anything else is absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_error<'de, D>(deserializer: D) -> Result<Option<ErrorBody>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(Some(ErrorBody::deserialize(value).unwrap_or_default()))
}

// `details` is loosely typed server-side; anything but an array of objects is ignored.
fn lenient_details<'de, D>(deserializer: D) -> Result<Vec<ErrorDetail>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Error codes the server is known to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCode {
    TokenMissing,
    TokenInvalid,
    UserNotFound,
    AccountDisabled,
    FreeQuotaExceeded,
    PermissionDenied,
    RateLimitExceeded,
    ValidationError,
    DivinationError,
    NotFound,
    InternalError,
    Other(String),
}

impl ApiErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "TOKEN_MISSING" => Self::TokenMissing,
            "TOKEN_INVALID" => Self::TokenInvalid,
            "USER_NOT_FOUND" => Self::UserNotFound,
            "ACCOUNT_DISABLED" => Self::AccountDisabled,
            "FREE_QUOTA_EXCEEDED" => Self::FreeQuotaExceeded,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "RATE_LIMIT_EXCEEDED" => Self::RateLimitExceeded,
            "VALIDATION_ERROR" => Self::ValidationError,
            "DIVINATION_ERROR" => Self::DivinationError,
            "NOT_FOUND" => Self::NotFound,
            "INTERNAL_ERROR" => Self::InternalError,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TokenMissing => "TOKEN_MISSING",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::FreeQuotaExceeded => "FREE_QUOTA_EXCEEDED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::DivinationError => "DIVINATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Other(code) => code,
        }
    }

    /// Friendly description for UIs; `None` for codes we don't know.
    pub fn description(&self) -> Option<&'static str> {
        match self {
            Self::TokenMissing => Some("Please sign in first"),
            Self::TokenInvalid => Some("Your session has expired, please sign in again"),
            Self::UserNotFound => Some("User does not exist"),
            Self::AccountDisabled => Some("This account has been disabled"),
            Self::FreeQuotaExceeded => {
                Some("Today's free readings are used up, upgrade or try again tomorrow")
            }
            Self::PermissionDenied => Some("Permission denied"),
            Self::RateLimitExceeded => Some("Too many requests, please try again later"),
            Self::ValidationError => Some("Parameter validation failed"),
            Self::DivinationError => Some("The reading could not be computed"),
            Self::NotFound => Some("Resource not found"),
            Self::InternalError => Some("Internal server error"),
            Self::Other(_) => None,
        }
    }
}
