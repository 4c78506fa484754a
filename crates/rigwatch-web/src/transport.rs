//! HTTP transport for device command endpoints

use async_trait::async_trait;
use reqwest::StatusCode;
use rigwatch_core::{Parameters, Scalar};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Device command port
pub const DEFAULT_PORT: u16 = 4028;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status: {0}")]
    Status(StatusCode),
}

/// A channel that can run device commands
///
/// `send` is total: any failure resolves to `None` instead of an error, so
/// callers can treat an unreachable device as missing data.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, command: &str, parameters: Option<&Parameters>) -> Option<Value>;

    /// Run a command that requires the device credential
    async fn send_privileged(
        &self,
        command: &str,
        parameters: Option<&Parameters>,
    ) -> Option<Value> {
        self.send(command, parameters).await
    }
}

/// HTTP transport for a single device
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    password: Option<String>,
}

impl HttpTransport {
    /// Create a transport targeting `ip:port` with a per-request timeout
    pub fn new(ip: IpAddr, port: u16, timeout_ms: u64) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("http://{}", SocketAddr::new(ip, port)),
            password: None,
        })
    }

    /// Set the credential attached to privileged commands
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// URL for a command
    pub fn url(&self, command: &str) -> String {
        format!("{}/{}", self.base_url, command)
    }

    async fn request(
        &self,
        command: &str,
        parameters: Option<&Parameters>,
    ) -> Result<Value, TransportError> {
        let url = self.url(command);

        let response = match parameters {
            Some(params) if !params.is_empty() => {
                trace!(url = %url, params = params.len(), "POST command");
                self.client.post(&url).json(params).send().await?
            }
            _ => {
                trace!(url = %url, "GET command");
                self.client.get(&url).send().await?
            }
        };

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        Ok(response.json::<Value>().await?)
    }

    /// One-shot authentication; failure is logged and reported, never raised
    pub async fn authenticate(&self) -> bool {
        let body = serde_json::json!({
            "password": self.password,
            "param": null,
        });

        match self.client.post(self.url("authenticate")).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(base = %self.base_url, status = %resp.status(), "Authentication rejected");
                false
            }
            Err(e) => {
                debug!(base = %self.base_url, error = %e, "Authentication failed");
                false
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, command: &str, parameters: Option<&Parameters>) -> Option<Value> {
        match self.request(command, parameters).await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(base = %self.base_url, command = %command, error = %e, "Command failed");
                None
            }
        }
    }

    async fn send_privileged(
        &self,
        command: &str,
        parameters: Option<&Parameters>,
    ) -> Option<Value> {
        let mut params = parameters.cloned().unwrap_or_default();
        if let Some(ref password) = self.password {
            params.insert("password".to_string(), Scalar::Str(password.clone()));
        }
        self.send(command, Some(&params)).await
    }
}
