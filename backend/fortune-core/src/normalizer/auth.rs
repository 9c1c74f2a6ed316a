use crate::error::PipelineError;
use crate::normalizer::{id_string, lenient, raw_object, text, unsigned};

use models::{AuthSession, TokenPair, UserProfile};

use serde::Deserialize;
use serde_json::Value;

const TOKENS_KEY: &str = "tokens";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawUser {
    id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    email: Option<String>,
    #[serde(deserialize_with = "lenient")]
    phone: Option<String>,
    #[serde(deserialize_with = "lenient")]
    created_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    profile: Option<RawProfile>,
    #[serde(deserialize_with = "lenient")]
    divination: Option<RawQuota>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawProfile {
    #[serde(deserialize_with = "lenient")]
    nickname: Option<String>,
    #[serde(deserialize_with = "lenient")]
    avatar: Option<String>,
    #[serde(deserialize_with = "lenient")]
    gender: Option<String>,
    #[serde(alias = "birthDate", deserialize_with = "lenient")]
    birthday: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawQuota {
    free_count: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAuthPayload {
    user: Option<Value>,
    free_count: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    is_first_login: Option<bool>,
}

/// Token pair from `data.tokens`, or from `data` itself.
///
/// # Errors
///
/// [`PipelineError::MalformedPayload`] when no non-empty access token is present.
pub fn token_pair(data: &Value) -> Result<TokenPair, PipelineError> {
    let source = data.get(TOKENS_KEY).unwrap_or(data);
    let tokens = TokenPair::deserialize(source)
        .map_err(|_| PipelineError::malformed("Response is missing accessToken"))?;
    if tokens.access_token.is_empty() {
        return Err(PipelineError::malformed("Response is missing accessToken"));
    }
    Ok(tokens)
}

/// Flatten a backend user (`{ id, email, phone, profile: {...} }`).
pub fn user_profile(user: &Value) -> Result<UserProfile, PipelineError> {
    let raw: RawUser = raw_object(user, "user")?;
    Ok(map_user(raw).0)
}

/// Login and registration responses: `{ user, tokens, freeCount?, isFirstLogin? }`.
///
/// `is_first_login` falls back to `true` for a fresh registration and to
/// "profile incomplete" otherwise.
pub fn auth_session(data: &Value, registered: bool) -> Result<AuthSession, PipelineError> {
    let tokens = token_pair(data)?;
    let raw: RawAuthPayload = raw_object(data, "authentication")?;

    let (user, user_free_count) = match raw.user.as_ref().filter(|user| user.is_object()) {
        Some(user) => map_user(RawUser::deserialize(user)?),
        None => (UserProfile::default(), None),
    };

    let free_count = user_free_count
        .or_else(|| unsigned(raw.free_count.as_ref()))
        .map(clamp_count)
        .unwrap_or(0);
    let is_first_login = if registered {
        true
    } else {
        raw.is_first_login
            .unwrap_or_else(|| !user.has_completed_profile())
    };

    Ok(AuthSession {
        user,
        tokens,
        free_count,
        is_first_login,
    })
}

/// `freeCount` from `user/divination-count`, `None` when absent.
pub fn free_count(data: &Value) -> Option<u32> {
    unsigned(data.get("freeCount")).map(clamp_count)
}

fn map_user(raw: RawUser) -> (UserProfile, Option<u64>) {
    let profile = raw.profile.unwrap_or_default();
    let free_count = raw
        .divination
        .and_then(|quota| unsigned(quota.free_count.as_ref()));

    let user = UserProfile {
        id: id_string(raw.id.as_ref()),
        email: text(raw.email).unwrap_or_default(),
        nickname: text(profile.nickname).unwrap_or_default(),
        avatar: text(profile.avatar).unwrap_or_default(),
        gender: text(profile.gender).unwrap_or_default(),
        birth_date: text(profile.birthday).unwrap_or_default(),
        phone: text(raw.phone).unwrap_or_default(),
        created_at: text(raw.created_at),
    };
    (user, free_count)
}

fn clamp_count(count: u64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
