pub mod config;
pub mod credential;
pub mod pipeline;

pub use credential::CredentialError;
pub use pipeline::PipelineError;

use common::ErrorLocation;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Pipeline(#[from] pipeline::PipelineError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Credential(#[from] credential::CredentialError),

    #[error("Logger Error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },
}
