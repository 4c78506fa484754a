//! Extractor interface and the dependency view handed to extractors

use async_trait::async_trait;
use rigwatch_core::{FieldRegistry, TelemetryValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Resource not available: {0}")]
    MissingResource(String),
    #[error("Unexpected response shape: {0}")]
    Schema(String),
}

/// `Ok(None)` means the device has no value for this field
pub type ExtractResult = Result<Option<TelemetryValue>, ExtractError>;

/// Produces one telemetry field from prefetched resources
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, deps: &Dependencies) -> ExtractResult;
}

#[async_trait]
impl<F> Extractor for F
where
    F: Fn(&Dependencies) -> ExtractResult + Send + Sync,
{
    async fn extract(&self, deps: &Dependencies) -> ExtractResult {
        (self)(deps)
    }
}

pub type SharedExtractor = Arc<dyn Extractor>;

/// Registry of fields backed by shared extractors
pub type Registry = FieldRegistry<SharedExtractor>;

/// Wrap a plain function as a shared extractor
pub fn extractor<F>(f: F) -> SharedExtractor
where
    F: Fn(&Dependencies) -> ExtractResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A fetched shared resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    /// Response body, `None` when the fetch failed
    pub value: Option<Value>,
    /// Fetched as part of a fan-out batch
    pub batched: bool,
}

/// The resources one field's extractor may read, by resource key
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    cache: Arc<Vec<Resource>>,
    keys: HashMap<String, usize>,
}

impl Dependencies {
    pub(crate) fn new(cache: Arc<Vec<Resource>>, keys: HashMap<String, usize>) -> Self {
        Self { cache, keys }
    }

    /// Build a standalone view, mainly for exercising extractors directly
    pub fn from_resources<I, K>(resources: I) -> Self
    where
        I: IntoIterator<Item = (K, Resource)>,
        K: Into<String>,
    {
        let mut cache = Vec::new();
        let mut keys = HashMap::new();
        for (key, resource) in resources {
            keys.insert(key.into(), cache.len());
            cache.push(resource);
        }
        Self::new(Arc::new(cache), keys)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn resource(&self, key: &str) -> Option<&Resource> {
        self.keys.get(key).and_then(|&i| self.cache.get(i))
    }

    /// Response for a resource key, `None` if undeclared or the fetch failed
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.resource(key).and_then(|r| r.value.as_ref())
    }

    /// Like [`get`](Self::get) but failing with `MissingResource`
    pub fn require(&self, key: &str) -> Result<&Value, ExtractError> {
        self.get(key)
            .ok_or_else(|| ExtractError::MissingResource(key.to_string()))
    }

    /// Whether the resource came from a fan-out batch
    ///
    /// Lets an extractor tell a real zero from an unreachable endpoint.
    pub fn batched(&self, key: &str) -> bool {
        self.resource(key).map(|r| r.batched).unwrap_or(false)
    }

    pub fn declares(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }
}

/// Walk a JSON object by key path
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value, ExtractError> {
    let mut current = value;
    for (depth, key) in path.iter().enumerate() {
        current = current
            .get(*key)
            .ok_or_else(|| ExtractError::Schema(path[..=depth].join(".")))?;
    }
    Ok(current)
}
