use crate::error::config::ConfigError;
use crate::pipeline::RetryPolicy;
use crate::request::DeviceInfo;
use crate::{DEFAULT_API_BASE_URL, FORTUNE_CLIENT_VERSION};

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "fortune.toml";
pub const BASE_URL_ENV_VAR: &str = "FORTUNE_API_BASE_URL";

const APP_DIR_NAME: &str = "fortune";
const CREDENTIALS_FILE_NAME: &str = "credentials.json";
const MAX_TIMEOUT_SECS: u64 = 600;
const MAX_RETRY_ATTEMPTS: u32 = 10;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Backoff unit; retry `n` waits `base_delay_ms * 2^n`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
        }
    }
}

/// Overrides for the `X-Device-Info` header. Unset fields are detected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub is_mobile: Option<bool>,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub credentials_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub device: DeviceConfig,
    pub storage: StorageConfig,
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ClientConfig {
    /// Load config from `path`.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        let config: ClientConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {e}");
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// [`load`](Self::load), then apply environment overrides.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        if let Ok(env_path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_path.display());
        }

        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `FORTUNE_API_BASE_URL` replaces `api.base_url` when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV_VAR) {
            let base_url = base_url.trim();
            if !base_url.is_empty() {
                debug!("{BASE_URL_ENV_VAR} overrides api.base_url");
                self.api.base_url = base_url.to_string();
            }
        }
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid base URL: '{}'", self.api.base_url),
            });
        }

        if self.api.timeout_secs == 0 || self.api.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid timeout: {} (must be 1-{MAX_TIMEOUT_SECS} seconds)",
                    self.api.timeout_secs
                ),
            });
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid retry attempts: {} (must be 1-{MAX_RETRY_ATTEMPTS})",
                    self.retry.max_attempts
                ),
            });
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }

    pub fn device_info(&self) -> DeviceInfo {
        let detected = DeviceInfo::detect();
        DeviceInfo {
            is_mobile: self.device.is_mobile.unwrap_or(detected.is_mobile),
            user_agent: self
                .device
                .user_agent
                .clone()
                .unwrap_or(detected.user_agent),
            platform: self.device.platform.clone().unwrap_or(detected.platform),
            client_version: FORTUNE_CLIENT_VERSION.to_string(),
        }
    }

    /// Configured path, else `{data_dir}/fortune/credentials.json`.
    pub fn credentials_path(&self) -> PathBuf {
        self.storage.credentials_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
                .join(CREDENTIALS_FILE_NAME)
        })
    }
}

/// `{config_dir}/fortune/fortune.toml`, or `./fortune.toml` without a config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}
