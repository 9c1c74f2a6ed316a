//! Typed endpoints on top of the [`Pipeline`].
//!
//! Authentication calls are the only ones that write to the credential
//! store. Listing endpoints (`history`, `stats`, `divination`) go through
//! `send_latest`, so re-requesting the same page supersedes the older call.

use crate::context::ClientContext;
use crate::error::PipelineError;
use crate::normalizer;
use crate::pipeline::Pipeline;
use crate::request::RequestDescriptor;
use crate::transport::{HttpTransport, Transport};

use common::ErrorLocation;
use models::{
    AuthSession, DivinationRequest, DivinationResult, HistoryPage, HistoryQuery, LoginRequest,
    RegisterRequest, Stats, UserProfile, UserRating,
};

use std::panic::Location;
use std::time::SystemTime;

use humantime::format_rfc3339;
use log::{debug, info, warn};
use uuid::Uuid;

pub const LOGIN_ENDPOINT: &str = "auth/login";
pub const REGISTER_ENDPOINT: &str = "auth/register";
pub const LOGOUT_ENDPOINT: &str = "auth/logout";
pub const PROFILE_ENDPOINT: &str = "user/profile";
pub const DIVINATION_COUNT_ENDPOINT: &str = "user/divination-count";
pub const DIVINATION_START_ENDPOINT: &str = "divination/start";
pub const DIVINATION_HISTORY_ENDPOINT: &str = "divination/history";
pub const DIVINATION_STATS_ENDPOINT: &str = "divination/stats";
const DIVINATION_ENDPOINT_PREFIX: &str = "divination";

const USERNAME_BASE_MAX_CHARS: usize = 16;
const USERNAME_FALLBACK: &str = "user";

pub struct FortuneClient<T = HttpTransport> {
    pipeline: Pipeline<T>,
}

impl<T> Clone for FortuneClient<T> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
        }
    }
}

impl FortuneClient<HttpTransport> {
    /// Client over HTTP using the context's base URL and timeout.
    pub fn connect(context: ClientContext) -> Result<Self, PipelineError> {
        let transport = HttpTransport::new(
            &context.config().api.base_url,
            context.config().request_timeout(),
        )?;
        Ok(Self::with_transport(transport, context))
    }
}

impl<T: Transport> FortuneClient<T> {
    pub fn with_transport(transport: T, context: ClientContext) -> Self {
        Self {
            pipeline: Pipeline::new(transport, context),
        }
    }

    pub fn from_pipeline(pipeline: Pipeline<T>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Pipeline<T> {
        &self.pipeline
    }

    pub fn is_logged_in(&self) -> bool {
        self.pipeline.credentials().get().is_logged_in()
    }

    // ============================================
    // AUTHENTICATION
    // ============================================

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession, PipelineError> {
        let descriptor = RequestDescriptor::post(LOGIN_ENDPOINT)
            .with_json(serde_json::to_value(request)?)
            .without_refresh();
        let data = self.pipeline.send(&descriptor).await?;

        let session = normalizer::auth_session(&data, false)?;
        self.store_tokens(&session)?;
        info!("Signed in as {}", request.identifier);
        Ok(session)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, PipelineError> {
        let descriptor = RequestDescriptor::post(REGISTER_ENDPOINT)
            .with_json(serde_json::to_value(request)?)
            .without_refresh();
        let data = self.pipeline.send(&descriptor).await?;

        let session = normalizer::auth_session(&data, true)?;
        self.store_tokens(&session)?;
        info!("Registered {}", request.username);
        Ok(session)
    }

    /// Register with only an email and password; the username is derived.
    pub async fn register_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, PipelineError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(PipelineError::InvalidInput {
                message: String::from("Email and password are required"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let request = RegisterRequest {
            username: username_from_email(email),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.register(&request).await
    }

    /// Tell the server, then clear local credentials whatever it answered.
    pub async fn logout(&self) -> Result<(), PipelineError> {
        if self.is_logged_in() {
            let descriptor = RequestDescriptor::post(LOGOUT_ENDPOINT).without_refresh();
            if let Err(error) = self.pipeline.send(&descriptor).await {
                warn!("Server logout failed, clearing local session anyway: {error}");
            }
        }

        self.pipeline.cancel_all();
        self.pipeline.context().reset()?;
        info!("Signed out");
        Ok(())
    }

    pub async fn profile(&self) -> Result<UserProfile, PipelineError> {
        let data = self
            .pipeline
            .send(&RequestDescriptor::get(PROFILE_ENDPOINT))
            .await?;
        normalizer::user_profile(data.get("user").unwrap_or(&data))
    }

    /// Remaining free readings, `None` when the server does not say.
    pub async fn divination_count(&self) -> Result<Option<u32>, PipelineError> {
        let data = self
            .pipeline
            .send(&RequestDescriptor::get(DIVINATION_COUNT_ENDPOINT))
            .await?;
        Ok(normalizer::free_count(&data))
    }

    // ============================================
    // DIVINATION
    // ============================================

    /// Submit a question. Not retried after the request may have reached
    /// the server, since every submission spends quota.
    pub async fn perform(
        &self,
        request: &DivinationRequest,
    ) -> Result<DivinationResult, PipelineError> {
        let now = format_rfc3339(SystemTime::now()).to_string();
        let body = request.clone().with_default_datetime(now).to_body();
        debug!("Submitting divination ({})", request.method.name());

        let data = self
            .pipeline
            .send(&RequestDescriptor::post(DIVINATION_START_ENDPOINT).with_json(body))
            .await?;
        normalizer::divination_result(&data)
    }

    pub async fn divination(&self, id: &str) -> Result<DivinationResult, PipelineError> {
        let path = divination_path(id, None)?;
        let data = self
            .pipeline
            .send_latest(&RequestDescriptor::get(path))
            .await?;
        normalizer::divination_result(&data)
    }

    pub async fn history(&self, query: &HistoryQuery) -> Result<HistoryPage, PipelineError> {
        let descriptor =
            RequestDescriptor::get(DIVINATION_HISTORY_ENDPOINT).with_query_pairs(query.to_pairs());
        let data = self.pipeline.send_latest(&descriptor).await?;
        normalizer::history_page(&data, query)
    }

    pub async fn stats(&self) -> Result<Stats, PipelineError> {
        let data = self
            .pipeline
            .send_latest(&RequestDescriptor::get(DIVINATION_STATS_ENDPOINT))
            .await?;
        normalizer::stats(&data)
    }

    /// Rate a reading. Returns the rating as stored by the server, if echoed.
    pub async fn rate(
        &self,
        id: &str,
        rating: &UserRating,
    ) -> Result<Option<UserRating>, PipelineError> {
        let path = divination_path(id, Some("rating"))?;
        let descriptor = RequestDescriptor::put(path)
            .with_json(serde_json::to_value(rating)?)
            .with_idempotent(true);
        let data = self.pipeline.send(&descriptor).await?;

        Ok(data
            .get("rating")
            .filter(|rating| rating.is_object())
            .and_then(|rating| serde_json::from_value(rating.clone()).ok()))
    }

    fn store_tokens(&self, session: &AuthSession) -> Result<(), PipelineError> {
        let refresh_token = session
            .tokens
            .refresh_token
            .clone()
            .unwrap_or_default();
        self.pipeline
            .credentials()
            .set(session.tokens.access_token.clone(), refresh_token)?;
        Ok(())
    }
}

#[track_caller]
fn divination_path(id: &str, suffix: Option<&str>) -> Result<String, PipelineError> {
    let id = id.trim();
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(PipelineError::InvalidInput {
            message: format!("Invalid divination id: '{id}'"),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(match suffix {
        Some(suffix) => format!("{DIVINATION_ENDPOINT_PREFIX}/{id}/{suffix}"),
        None => format!("{DIVINATION_ENDPOINT_PREFIX}/{id}"),
    })
}

/// `{local-part, cleaned, max 16 chars}_{4 digits}`.
pub fn username_from_email(email: &str) -> String {
    let local_part = email.split('@').next().unwrap_or_default();
    let cleaned: String = local_part
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .take(USERNAME_BASE_MAX_CHARS)
        .collect();
    let base = if cleaned.is_empty() {
        USERNAME_FALLBACK.to_string()
    } else {
        cleaned
    };
    let suffix = Uuid::new_v4().as_u128() % 10_000;
    format!("{base}_{suffix:04}")
}

impl<T> std::fmt::Debug for FortuneClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FortuneClient").finish_non_exhaustive()
    }
}

