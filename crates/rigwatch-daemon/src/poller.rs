//! Polling rounds over every configured miner

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rigwatch_core::{AggregationResult, MinerSnapshot, RegistryError};
use rigwatch_miners::{find_model, ConnectionSettings, MinerBackend};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Build one backend per configured miner
pub fn build_backends(config: &Config) -> Result<Vec<Arc<MinerBackend>>> {
    let extract_timeout = Duration::from_millis(config.poll.extract_timeout_ms);

    config
        .miners
        .iter()
        .map(|miner| {
            let model = find_model(&miner.model)
                .ok_or_else(|| anyhow!("unsupported model {:?} for {}", miner.model, miner.ip))?;
            let settings = ConnectionSettings {
                port: miner.port,
                timeout_ms: config.poll.timeout_ms,
                password: miner.password.clone(),
            };
            let backend = MinerBackend::connect(miner.ip, *model, &settings)
                .with_context(|| format!("creating backend for {}", miner.ip))?
                .with_extract_timeout(extract_timeout);
            Ok(Arc::new(backend))
        })
        .collect()
}

/// Poll every backend with at most `concurrency` in flight
///
/// `fields` empty means every registered field. Snapshots come back in
/// completion order, one per backend.
pub async fn poll_round(
    backends: &[Arc<MinerBackend>],
    fields: &[String],
    concurrency: usize,
) -> Result<Vec<MinerSnapshot>, RegistryError> {
    let started = Utc::now();
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let fields = Arc::new(fields.to_vec());
    let mut tasks = JoinSet::new();

    for backend in backends {
        let backend = Arc::clone(backend);
        let permits = Arc::clone(&permits);
        let fields = Arc::clone(&fields);

        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            debug!(ip = %backend.ip(), "Polling miner");

            let requested: Vec<String> = if fields.is_empty() {
                backend.field_names().into_iter().map(String::from).collect()
            } else {
                fields.to_vec()
            };
            let (ip, model) = (backend.ip(), backend.model().name);
            let poll = async move {
                if fields.is_empty() {
                    backend.get_all().await
                } else {
                    backend.get_data(fields.as_slice()).await
                }
            };
            guarded(ip, model, &requested, poll).await
        });
    }

    let mut snapshots = Vec::with_capacity(backends.len());
    let mut failure = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(snapshot)) => snapshots.push(snapshot),
            Ok(Err(e)) => {
                failure.get_or_insert(e);
            }
            Err(e) => warn!(error = %e, "Poll task failed"),
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }

    let elapsed = Utc::now() - started;
    info!(
        miners = snapshots.len(),
        elapsed_ms = elapsed.num_milliseconds(),
        "Polling round complete"
    );
    Ok(snapshots)
}

/// Run one miner's poll on its own task
///
/// A panic yields a snapshot with every requested field absent.
async fn guarded<F>(
    ip: IpAddr,
    model: &'static str,
    requested: &[String],
    poll: F,
) -> Result<MinerSnapshot, RegistryError>
where
    F: Future<Output = Result<MinerSnapshot, RegistryError>> + Send + 'static,
{
    match tokio::spawn(poll).await {
        Ok(result) => result,
        Err(e) => {
            warn!(ip = %ip, error = %e, "Miner poll failed");
            Ok(MinerSnapshot::new(ip, model, AggregationResult::absent(requested)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MinerConfig, PollConfig};
    use async_trait::async_trait;
    use rigwatch_core::{Parameters, TelemetryValue};
    use rigwatch_web::Transport;
    use serde_json::{json, Value};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tracks how many summaries are being served at once
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    struct FakeDevice {
        hostname: String,
        gauge: Arc<Gauge>,
    }

    #[async_trait]
    impl Transport for FakeDevice {
        async fn send(&self, command: &str, _parameters: Option<&Parameters>) -> Option<Value> {
            if command != "summary" {
                return None;
            }
            let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.gauge.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.gauge.current.fetch_sub(1, Ordering::SeqCst);
            Some(json!({"Hostname": self.hostname}))
        }
    }

    fn backends(count: u8, gauge: &Arc<Gauge>) -> Vec<Arc<MinerBackend>> {
        let model = *find_model("S19").unwrap();
        (0..count)
            .map(|i| {
                let device = FakeDevice {
                    hostname: format!("rig-{i}"),
                    gauge: Arc::clone(gauge),
                };
                let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, i));
                Arc::new(MinerBackend::new(ip, model, Arc::new(device)).unwrap())
            })
            .collect()
    }

    #[tokio::test]
    async fn test_round_respects_concurrency() {
        let gauge = Arc::new(Gauge::default());
        let backends = backends(6, &gauge);

        let snapshots = poll_round(&backends, &["hostname".to_string()], 2)
            .await
            .unwrap();

        assert_eq!(snapshots.len(), 6);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
        let mut hostnames: Vec<_> = snapshots
            .iter()
            .filter_map(|s| s.fields.get("hostname").and_then(TelemetryValue::as_str))
            .collect();
        hostnames.sort();
        assert_eq!(hostnames[0], "rig-0");
        assert_eq!(hostnames.len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_field_fails_round() {
        let gauge = Arc::new(Gauge::default());
        let backends = backends(2, &gauge);

        let err = poll_round(&backends, &["voltage".to_string()], 4)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownField("voltage".into()));
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_fields_polls_everything() {
        let gauge = Arc::new(Gauge::default());
        let backends = backends(1, &gauge);

        let snapshots = poll_round(&backends, &[], 1).await.unwrap();
        assert_eq!(snapshots[0].fields.len(), backends[0].field_names().len());
    }

    async fn crashing_poll() -> Result<MinerSnapshot, RegistryError> {
        panic!("backend state corrupted")
    }

    #[tokio::test]
    async fn test_panicked_poll_yields_absent_snapshot() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));
        let requested = vec!["hostname".to_string(), "wattage".to_string()];

        let snapshot = guarded(ip, "S19", &requested, crashing_poll()).await.unwrap();

        assert_eq!(snapshot.ip, ip);
        assert_eq!(snapshot.model, "S19");
        assert_eq!(snapshot.fields.len(), 2);
        assert!(snapshot.fields.is_absent("hostname"));
        assert!(snapshot.fields.is_absent("wattage"));
    }

    #[tokio::test]
    async fn test_guarded_passes_results_through() {
        let gauge = Arc::new(Gauge::default());
        let backend = backends(1, &gauge).remove(0);
        let ip = backend.ip();
        let requested = vec!["hostname".to_string()];

        let snapshot = guarded(ip, "S19", &requested, async move {
            backend.get_data(&["hostname"]).await
        })
        .await
        .unwrap();
        assert_eq!(snapshot.fields.get("hostname"), Some(&TelemetryValue::from("rig-0")));

        let err = guarded(ip, "S19", &requested, async {
            Err::<MinerSnapshot, _>(RegistryError::UnknownField("flux".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err, RegistryError::UnknownField("flux".into()));
    }

    #[test]
    fn test_build_backends_rejects_unknown_model() {
        let miner = |model: &str| MinerConfig {
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            model: model.to_string(),
            password: None,
            port: 4028,
        };
        let mut config = Config {
            poll: PollConfig::default(),
            miners: vec![miner("S19 XP")],
        };
        assert_eq!(build_backends(&config).unwrap().len(), 1);

        config.miners.push(miner("Avalon 1246"));
        assert!(build_backends(&config).is_err());
    }
}
