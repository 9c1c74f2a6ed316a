//! Shared primitives for the fortune client workspace.
//!
//! Everything here is dependency-light and used by both `models` and
//! `fortune-core`:
//!
//! - [`ErrorLocation`]: `file:line:column` captured with `#[track_caller]`
//! - [`HttpStatusCode`]: status categorization for the response classifier
//! - [`RedactedToken`]: credential strings that never reach logs

pub mod error;
pub mod http_status;
pub mod redacted_token;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;
