//! Domain models for the fortune client.
//!
//! This crate contains pure data structures: the server wire envelope,
//! authentication payloads, and the normalized shapes the rest of the
//! application reads (divination results, history pages, stats). Models have
//! no I/O - they're just data that can be passed between layers.
//!
//! ## Architecture
//!
//! - **models** (this crate): Pure data structures
//! - **fortune-core**: Request pipeline and normalization producing models
//! - **fortune**: CLI wiring everything together

pub mod auth;
pub mod divination;
pub mod envelope;
pub mod error;
pub mod history;
pub mod request;
pub mod stats;

#[cfg(test)]
mod tests;

pub use auth::{AuthSession, LoginRequest, RegisterRequest, TokenPair, UserProfile};
pub use divination::{
    Analysis, Completeness, ConsistencyIssue, DivinationResult, Hexagram, HexagramSet,
    IncompleteField, Interpretation, LineKind, LineView, PrimaryHexagram, Sentiment, UserRating,
    WuxingAnalysis,
};
pub use envelope::{ApiErrorCode, Envelope, ErrorBody, ErrorDetail};
pub use error::model_error::ModelError;
pub use history::{HistoryItem, HistoryPage, HistoryQuery, SortOrder};
pub use request::{CastingMethod, DivinationRequest, DivinationRequestBuilder};
pub use stats::Stats;
