//! Everything a pipeline needs besides the transport, passed explicitly.

use crate::config::ClientConfig;
use crate::credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::error::CredentialError;
use crate::pipeline::{LogObserver, PipelineObserver};
use crate::request::DeviceInfo;

use std::sync::Arc;

#[derive(Clone)]
pub struct ClientContext {
    config: ClientConfig,
    credentials: Arc<dyn CredentialStore>,
    device: DeviceInfo,
    observer: Arc<dyn PipelineObserver>,
}

impl ClientContext {
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let device = config.device_info();
        Self {
            config,
            credentials,
            device,
            observer: Arc::new(LogObserver),
        }
    }

    /// Context with a process-local credential store.
    pub fn in_memory(config: ClientConfig) -> Self {
        Self::new(config, Arc::new(MemoryCredentialStore::new()))
    }

    /// Context whose credentials persist at `config.credentials_path()`.
    pub fn persistent(config: ClientConfig) -> Result<Self, CredentialError> {
        let store = FileCredentialStore::open(config.credentials_path())?;
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn observer(&self) -> &dyn PipelineObserver {
        self.observer.as_ref()
    }

    /// Drop the session: stored credentials are cleared.
    pub fn reset(&self) -> Result<(), CredentialError> {
        self.credentials.clear()
    }
}
