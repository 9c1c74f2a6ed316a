pub mod api;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod logger;
pub mod normalizer;
pub mod pipeline;
pub mod request;
pub mod transport;

#[cfg(test)]
mod tests;

pub use api::FortuneClient;
pub use context::ClientContext;
pub use pipeline::Pipeline;

pub const FORTUNE_CLIENT_NAME: &str = "fortune-core";
pub const FORTUNE_CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FORTUNE_USER_AGENT: &str =
    const_format::concatcp!(FORTUNE_CLIENT_NAME, "/", FORTUNE_CLIENT_VERSION);
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000/api/";
