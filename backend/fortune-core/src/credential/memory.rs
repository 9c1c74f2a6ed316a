use crate::credential::{Credential, CredentialStore};
use crate::error::CredentialError;

use common::RedactedToken;

use std::sync::{PoisonError, RwLock};

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(credential),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Credential {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(
        &self,
        access_token: RedactedToken,
        refresh_token: RedactedToken,
    ) -> Result<(), CredentialError> {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Credential {
            access_token,
            refresh_token,
        };
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Credential::default();
        Ok(())
    }
}
