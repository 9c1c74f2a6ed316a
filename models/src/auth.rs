//! Authentication payloads.

use common::RedactedToken;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token pair returned by login, register and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: RedactedToken,
    /// Refresh responses may omit it; the stored one stays valid then.
    #[serde(default)]
    pub refresh_token: Option<RedactedToken>,
}

/// Flat view of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Option<String>,
    pub email: String,
    pub nickname: String,
    pub avatar: String,
    pub gender: String,
    pub birth_date: String,
    pub phone: String,
    pub created_at: Option<String>,
}

impl UserProfile {
    /// Nickname, gender and birth date are all filled in.
    pub fn has_completed_profile(&self) -> bool {
        !self.nickname.is_empty() && !self.gender.is_empty() && !self.birth_date.is_empty()
    }
}

/// Result of a successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserProfile,
    pub tokens: TokenPair,
    pub free_count: u32,
    pub is_first_login: bool,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email or username.
    pub identifier: String,
    pub password: String,
    pub remember_me: bool,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
