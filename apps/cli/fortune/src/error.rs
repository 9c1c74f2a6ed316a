use fortune_core::error::config::ConfigError;
use fortune_core::error::{CoreError, CredentialError, PipelineError};

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by `fortune` commands.
///
/// Printed as JSON on stderr, so they keep their structure and location.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum CliError {
    /// Bad command-line input
    #[error("Input Error: {message} {location}")]
    Input {
        message: String,
        location: ErrorLocation,
    },

    /// Startup failed (config, logging, credential store)
    #[error("Setup Error: {message} {location}")]
    Setup {
        message: String,
        location: ErrorLocation,
    },

    /// A request failed after the pipeline gave up
    #[error("Request Error: {message} {location}")]
    Request {
        message: String,
        code: Option<String>,
        status: Option<u16>,
        requires_login: bool,
        location: ErrorLocation,
    },

    #[error("Output Error: {message} {location}")]
    Output {
        message: String,
        location: ErrorLocation,
    },
}

impl CliError {
    #[track_caller]
    pub fn input(message: impl Into<String>) -> Self {
        CliError::Input {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<PipelineError> for CliError {
    #[track_caller]
    fn from(error: PipelineError) -> Self {
        CliError::Request {
            message: error.user_message(),
            code: error.code().map(|code| code.as_str().to_string()),
            status: error.status().map(|status| status.as_u16()),
            requires_login: error.requires_login(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for CliError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        CliError::Setup {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<CredentialError> for CliError {
    #[track_caller]
    fn from(error: CredentialError) -> Self {
        CliError::Setup {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<CoreError> for CliError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Pipeline(error) => error.into(),
            other => CliError::Setup {
                message: other.to_string(),
                location: ErrorLocation::from(Location::caller()),
            },
        }
    }
}

impl From<serde_json::Error> for CliError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        CliError::Output {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
