//! Credential storage: the current access/refresh token pair.
//!
//! Only login, registration, refresh and logout mutate the store. An empty
//! access token means "logged out".

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use crate::error::CredentialError;

use common::RedactedToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub access_token: RedactedToken,
    pub refresh_token: RedactedToken,
}

impl Credential {
    pub fn new(access_token: impl Into<RedactedToken>, refresh_token: impl Into<RedactedToken>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

pub trait CredentialStore: Send + Sync + 'static {
    fn get(&self) -> Credential;

    fn set(&self, access_token: RedactedToken, refresh_token: RedactedToken)
    -> Result<(), CredentialError>;

    fn clear(&self) -> Result<(), CredentialError>;
}
