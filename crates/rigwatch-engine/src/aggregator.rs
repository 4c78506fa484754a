//! Aggregation engine - collects a set of telemetry fields in one round

use rigwatch_core::{AggregationResult, FanOutResult, RegistryError, SharedResourceRef};
use rigwatch_web::{fan_out, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::extract::{Dependencies, Registry, Resource};

/// Default bound on a single extractor invocation
pub const DEFAULT_EXTRACT_TIMEOUT_MS: u64 = 5000;

/// Collects telemetry fields for one device
pub struct Aggregator {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    extract_timeout: Duration,
}

impl Aggregator {
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            extract_timeout: Duration::from_millis(DEFAULT_EXTRACT_TIMEOUT_MS),
        }
    }

    pub fn with_extract_timeout(mut self, extract_timeout: Duration) -> Self {
        self.extract_timeout = extract_timeout;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one aggregation round
    ///
    /// The result has an entry for every distinct requested field. Only an
    /// unknown field name fails the call, and it does so before any request
    /// is sent.
    pub async fn collect<S: AsRef<str>>(
        &self,
        field_names: &[S],
    ) -> Result<AggregationResult, RegistryError> {
        let resolution = self.registry.resolve(field_names)?;

        debug!(
            fields = resolution.fields.len(),
            resources = resolution.resources.len(),
            "Starting aggregation round"
        );

        let cache = Arc::new(self.fetch_resources(&resolution.resources).await);

        let mut result = AggregationResult::absent(&resolution.field_names());
        let mut tasks = JoinSet::new();

        for spec in &resolution.fields {
            let keys: HashMap<String, usize> = spec
                .dependencies
                .iter()
                .filter_map(|dep| {
                    resolution
                        .resource_index(dep)
                        .map(|i| (dep.resource_key.clone(), i))
                })
                .collect();
            let deps = Dependencies::new(Arc::clone(&cache), keys);
            let extractor = Arc::clone(&spec.extractor);
            let name = spec.name.clone();
            let limit = self.extract_timeout;

            tasks.spawn(async move {
                let outcome = timeout(limit, extractor.extract(&deps)).await;
                (name, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(Ok(value)))) => {
                    if value.is_none() {
                        trace!(field = %name, "No value");
                    }
                    result.insert(name, value);
                }
                Ok((name, Ok(Err(e)))) => {
                    debug!(field = %name, error = %e, "Extraction failed");
                }
                Ok((name, Err(_))) => {
                    warn!(field = %name, timeout = ?self.extract_timeout, "Extraction timed out");
                }
                Err(e) => {
                    warn!(error = %e, "Extractor task failed");
                }
            }
        }

        debug!(
            requested = result.len(),
            collected = result.collected(),
            "Aggregation round complete"
        );

        Ok(result)
    }

    /// Fetch each distinct resource once
    ///
    /// Parameterless commands go out as one fan-out batch; parameterized
    /// ones are sent individually alongside it.
    async fn fetch_resources(&self, resources: &[&SharedResourceRef]) -> Vec<Resource> {
        let batch: Vec<&str> = resources
            .iter()
            .filter(|r| !r.is_parameterized())
            .map(|r| r.fetch_command.as_str())
            .collect();

        let mut singles = JoinSet::new();
        for (i, r) in resources.iter().enumerate() {
            if !r.is_parameterized() {
                continue;
            }
            let transport = Arc::clone(&self.transport);
            let command = r.fetch_command.clone();
            let params = r.parameters.clone();
            singles.spawn(async move { (i, transport.send(&command, Some(&params)).await) });
        }

        let batched = async {
            if batch.is_empty() {
                FanOutResult::default()
            } else {
                fan_out(Arc::clone(&self.transport), &batch[..]).await
            }
        };

        let individual = async move {
            let mut out = HashMap::new();
            while let Some(joined) = singles.join_next().await {
                match joined {
                    Ok((i, value)) => {
                        out.insert(i, value);
                    }
                    Err(e) => warn!(error = %e, "Resource fetch task failed"),
                }
            }
            out
        };

        let (fanned, mut individual) = tokio::join!(batched, individual);

        resources
            .iter()
            .enumerate()
            .map(|(i, r)| {
                if r.is_parameterized() {
                    Resource {
                        value: individual.remove(&i).flatten(),
                        batched: false,
                    }
                } else {
                    Resource {
                        value: fanned.get(&r.fetch_command).cloned(),
                        batched: fanned.batched,
                    }
                }
            })
            .collect()
    }
}
