//! Divination submission parameters.

use crate::ModelError;

use common::ErrorLocation;

use std::panic::Location;

use serde_json::{Value, json};

/// Longest question the server accepts, in characters.
pub const MAX_QUESTION_CHARS: usize = 200;

/// How the hexagram is cast.
#[derive(Debug, Clone, PartialEq)]
pub enum CastingMethod {
    /// Cast from a moment in time (RFC 3339). `None` means "now", filled in at send time.
    Time { datetime: Option<String> },
    Number { numbers: Vec<u32> },
    Manual {
        upper_trigram: String,
        lower_trigram: String,
        moving_line: u8,
    },
}

impl CastingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            CastingMethod::Time { .. } => "time",
            CastingMethod::Number { .. } => "number",
            CastingMethod::Manual { .. } => "manual",
        }
    }

    fn params(&self) -> Value {
        match self {
            CastingMethod::Time { datetime } => match datetime {
                Some(datetime) => json!({ "datetime": datetime }),
                None => json!({}),
            },
            CastingMethod::Number { numbers } => json!({ "numbers": numbers }),
            CastingMethod::Manual {
                upper_trigram,
                lower_trigram,
                moving_line,
            } => json!({
                "upperGua": upper_trigram,
                "lowerGua": lower_trigram,
                "movingLine": moving_line,
            }),
        }
    }
}

/// A validated question submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DivinationRequest {
    pub question: String,
    pub method: CastingMethod,
    pub location: Option<Value>,
}

impl DivinationRequest {
    pub fn builder() -> DivinationRequestBuilder {
        DivinationRequestBuilder::default()
    }

    /// Fill a missing time-method datetime.
    pub fn with_default_datetime(mut self, now: impl Into<String>) -> Self {
        if let CastingMethod::Time { datetime } = &mut self.method {
            if datetime.is_none() {
                *datetime = Some(now.into());
            }
        }
        self
    }

    /// Request body for `divination/start`.
    pub fn to_body(&self) -> Value {
        json!({
            "question": self.question,
            "method": self.method.name(),
            "params": self.method.params(),
            "location": self.location.clone().unwrap_or(Value::Null),
        })
    }
}

#[derive(Debug, Default)]
pub struct DivinationRequestBuilder {
    question: Option<String>,
    method: Option<CastingMethod>,
    location: Option<Value>,
}

impl DivinationRequestBuilder {
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn with_method(mut self, method: CastingMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_location(mut self, location: Value) -> Self {
        self.location = Some(location);
        self
    }

    /// Build with validation. The method defaults to time casting.
    #[track_caller]
    pub fn build(self) -> Result<DivinationRequest, ModelError> {
        let question = self
            .question
            .map(|question| question.trim().to_string())
            .unwrap_or_default();

        if question.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Question cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let length = question.chars().count();
        if length > MAX_QUESTION_CHARS {
            return Err(ModelError::Validation {
                message: format!(
                    "Question too long: {length} characters (maximum {MAX_QUESTION_CHARS})"
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let method = self
            .method
            .unwrap_or(CastingMethod::Time { datetime: None });

        match &method {
            CastingMethod::Number { numbers } if numbers.is_empty() => {
                return Err(ModelError::Validation {
                    message: String::from("Number casting requires at least one number"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            CastingMethod::Manual { moving_line, .. } if !(1..=6).contains(moving_line) => {
                return Err(ModelError::Validation {
                    message: format!("Moving line must be 1-6, got {moving_line}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            CastingMethod::Manual {
                upper_trigram,
                lower_trigram,
                ..
            } if upper_trigram.is_empty() || lower_trigram.is_empty() => {
                return Err(ModelError::Validation {
                    message: String::from("Manual casting requires both trigrams"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            _ => {}
        }

        Ok(DivinationRequest {
            question,
            method,
            location: self.location,
        })
    }
}
