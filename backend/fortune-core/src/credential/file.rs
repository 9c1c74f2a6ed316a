//! JSON-file credential store.
//!
//! Layout: `{ "token": "...", "refreshToken": "..." }`. Writes go through a
//! temp file + rename so a crash never leaves a half-written file behind.

use crate::credential::{Credential, CredentialStore};
use crate::error::CredentialError;

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use zeroize::Zeroize;

const ACCESS_TOKEN_KEY: &str = "token";
const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Deserialize, Default)]
struct StoredTokens {
    #[serde(default)]
    token: RedactedToken,
    #[serde(default, rename = "refreshToken")]
    refresh_token: RedactedToken,
}

#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cached: RwLock<Credential>,
}

impl FileCredentialStore {
    /// Open the store, loading tokens if the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let credential = load(&path)?;

        if credential.is_logged_in() {
            info!("Restored stored credentials from {}", path.display());
        } else {
            debug!("No stored credentials at {}", path.display());
        }

        Ok(Self {
            path,
            cached: RwLock::new(credential),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, credential: &Credential) -> Result<(), CredentialError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| CredentialError::WriteError {
                location: ErrorLocation::from(Location::caller()),
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut contents = json!({
            ACCESS_TOKEN_KEY: credential.access_token.expose(),
            REFRESH_TOKEN_KEY: credential.refresh_token.expose(),
        })
        .to_string();

        let written = std::fs::write(&temp_path, &contents);
        contents.zeroize();
        written.map_err(|e| CredentialError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| CredentialError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: self.path.clone(),
            source: e,
        })
    }
}

fn load(path: &Path) -> Result<Credential, CredentialError> {
    if !path.exists() {
        return Ok(Credential::default());
    }

    let mut contents = std::fs::read_to_string(path).map_err(|e| CredentialError::ReadError {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        source: e,
    })?;

    let parsed = serde_json::from_str::<StoredTokens>(&contents);
    contents.zeroize();

    let stored = parsed.map_err(|e| CredentialError::ParseError {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(Credential {
        access_token: stored.token,
        refresh_token: stored.refresh_token,
    })
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Credential {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(
        &self,
        access_token: RedactedToken,
        refresh_token: RedactedToken,
    ) -> Result<(), CredentialError> {
        let credential = Credential {
            access_token,
            refresh_token,
        };
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&credential)?;
        *cached = credential;
        Ok(())
    }

    /// The file goes first; if it cannot be removed the session stays put.
    fn clear(&self) -> Result<(), CredentialError> {
        let mut cached = self.cached.write().unwrap_or_else(PoisonError::into_inner);

        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| CredentialError::WriteError {
                location: ErrorLocation::from(Location::caller()),
                path: self.path.clone(),
                source: e,
            })?;
        }
        *cached = Credential::default();

        info!("Stored credentials cleared");
        Ok(())
    }
}
