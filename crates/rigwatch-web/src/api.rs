//! Typed ePIC firmware command wrappers

use rigwatch_core::{Parameters, Scalar};
use serde_json::Value;
use std::sync::Arc;

use crate::transport::Transport;

/// ePIC read commands used for telemetry
pub mod commands {
    pub const SUMMARY: &str = "summary";
    pub const NETWORK: &str = "network";
    pub const HASHRATE: &str = "hashrate";
}

fn param(value: impl Into<Scalar>) -> Parameters {
    let mut params = Parameters::new();
    params.insert("param".to_string(), value.into());
    params
}

/// Privileged control commands of an ePIC-firmware miner
///
/// Reads go through the aggregation engine instead.
#[derive(Clone)]
pub struct EpicWebApi {
    transport: Arc<dyn Transport>,
}

impl EpicWebApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn reboot(&self, delay_secs: u32) -> Option<Value> {
        self.transport
            .send_privileged("reboot", Some(&param(delay_secs)))
            .await
    }

    pub async fn identify(&self, led_on: bool) -> Option<Value> {
        self.transport
            .send_privileged("identify", Some(&param(led_on)))
            .await
    }

    pub async fn fan_speed(&self, percent: u32) -> Option<Value> {
        self.transport
            .send_privileged("fanspeed", Some(&param(percent)))
            .await
    }

    /// `false` stops mining, `true` lets the miner start mining on boot and now
    pub async fn set_autostart(&self, autostart: bool) -> Option<Value> {
        let mode = if autostart { "Autostart" } else { "Stop" };
        self.transport.send_privileged("miner", Some(&param(mode))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpTransport;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn api(addr: SocketAddr) -> EpicWebApi {
        let transport = HttpTransport::new(addr.ip(), addr.port(), 2000)
            .unwrap()
            .with_password("letmein");
        EpicWebApi::new(Arc::new(transport))
    }

    #[tokio::test]
    async fn test_privileged_commands_send_param_and_password() {
        let router = Router::new()
            .route("/identify", post(|Json(body): Json<Value>| async move { Json(body) }))
            .route("/miner", post(|Json(body): Json<Value>| async move { Json(body) }));
        let api = api(serve(router).await);

        let resp = api.identify(true).await.unwrap();
        assert_eq!(resp["param"], true);
        assert_eq!(resp["password"], "letmein");

        let resp = api.set_autostart(false).await.unwrap();
        assert_eq!(resp["param"], "Stop");
        let resp = api.set_autostart(true).await.unwrap();
        assert_eq!(resp["param"], "Autostart");
    }

    #[tokio::test]
    async fn test_unrouted_command_is_none() {
        let api = api(serve(Router::new()).await);
        assert!(api.reboot(0).await.is_none());
    }
}
