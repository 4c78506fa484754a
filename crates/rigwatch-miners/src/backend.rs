//! Miner backend - field registry plus model data for one device

use rigwatch_core::{MinerSnapshot, RegistryError, TelemetryValue};
use rigwatch_engine::{Aggregator, Registry};
use rigwatch_web::{EpicWebApi, HttpTransport, Transport, TransportError, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::epic;
use crate::model::MinerModel;

/// Fields that keep their last collected value when a round comes back empty
const STICKY_FIELDS: &[&str] = &["fw_ver", "hostname"];

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// How to reach a device
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub port: u16,
    pub timeout_ms: u64,
    pub password: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            password: None,
        }
    }
}

/// An ePIC-firmware miner
pub struct MinerBackend {
    ip: IpAddr,
    model: MinerModel,
    api: EpicWebApi,
    aggregator: Aggregator,
    last_known: RwLock<HashMap<String, TelemetryValue>>,
}

impl MinerBackend {
    pub fn new(
        ip: IpAddr,
        model: MinerModel,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, BackendError> {
        let registry: Registry = epic::registry(model)?;
        let aggregator = Aggregator::new(Arc::new(registry), Arc::clone(&transport));

        Ok(Self {
            ip,
            model,
            api: EpicWebApi::new(transport),
            aggregator,
            last_known: RwLock::new(HashMap::new()),
        })
    }

    /// Build a backend talking HTTP to `ip`
    pub fn connect(
        ip: IpAddr,
        model: MinerModel,
        settings: &ConnectionSettings,
    ) -> Result<Self, BackendError> {
        let mut transport = HttpTransport::new(ip, settings.port, settings.timeout_ms)?;
        if let Some(ref password) = settings.password {
            transport = transport.with_password(password.clone());
        }
        Self::new(ip, model, Arc::new(transport))
    }

    pub fn with_extract_timeout(mut self, extract_timeout: Duration) -> Self {
        self.aggregator = self.aggregator.with_extract_timeout(extract_timeout);
        self
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn model(&self) -> &MinerModel {
        &self.model
    }

    /// Names of every field this backend can collect
    pub fn field_names(&self) -> Vec<&str> {
        self.aggregator.registry().field_names()
    }

    /// Collect the requested fields into a snapshot
    pub async fn get_data<S: AsRef<str>>(&self, fields: &[S]) -> Result<MinerSnapshot, RegistryError> {
        let mut result = self.aggregator.collect(fields).await?;

        let mut last_known = self.last_known.write().await;
        for &field in STICKY_FIELDS {
            if !result.contains_field(field) {
                continue;
            }
            match result.get(field).cloned() {
                Some(value) => {
                    last_known.insert(field.to_string(), value);
                }
                None => {
                    if let Some(previous) = last_known.get(field) {
                        debug!(ip = %self.ip, field = %field, "Using last known value");
                        result.insert(field, Some(previous.clone()));
                    }
                }
            }
        }
        drop(last_known);

        Ok(MinerSnapshot::new(self.ip, self.model.name, result))
    }

    /// Collect every registered field
    pub async fn get_all(&self) -> Result<MinerSnapshot, RegistryError> {
        let fields = self.field_names();
        self.get_data(&fields).await
    }

    pub async fn reboot(&self) -> bool {
        info!(ip = %self.ip, "Rebooting miner");
        self.api.reboot(0).await.is_some()
    }

    pub async fn stop_mining(&self) -> bool {
        info!(ip = %self.ip, "Stopping mining");
        self.api.set_autostart(false).await.is_some()
    }

    pub async fn resume_mining(&self) -> bool {
        info!(ip = %self.ip, "Resuming mining");
        self.api.set_autostart(true).await.is_some()
    }

    pub async fn identify(&self, on: bool) -> bool {
        debug!(ip = %self.ip, on, "Identify");
        self.api.identify(on).await.is_some()
    }

    pub async fn set_fan_speed(&self, percent: u32) -> bool {
        debug!(ip = %self.ip, percent, "Setting fan speed");
        self.api.fan_speed(percent.min(100)).await.is_some()
    }
}
