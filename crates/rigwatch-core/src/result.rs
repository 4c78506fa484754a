//! Result containers for aggregation rounds and fan-out batches

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use crate::value::TelemetryValue;

/// Outcome of one aggregation round
///
/// Holds exactly one entry per requested field; `None` marks a field that
/// exists but could not be collected this round.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregationResult {
    values: BTreeMap<String, Option<TelemetryValue>>,
}

impl AggregationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// A result with every field present but absent
    pub fn absent<S: AsRef<str>>(fields: &[S]) -> Self {
        Self {
            values: fields
                .iter()
                .map(|f| (f.as_ref().to_string(), None))
                .collect(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Option<TelemetryValue>) {
        self.values.insert(field.into(), value);
    }

    /// Collected value for a field, `None` when absent or not requested
    pub fn get(&self, field: &str) -> Option<&TelemetryValue> {
        self.values.get(field).and_then(Option::as_ref)
    }

    /// Whether the field was part of the round, collected or not
    pub fn contains_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn is_absent(&self, field: &str) -> bool {
        matches!(self.values.get(field), Some(None))
    }

    /// Number of fields that produced a value
    pub fn collected(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Merged responses of a concurrent command batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FanOutResult {
    /// Command -> response, `None` when the command failed
    pub responses: HashMap<String, Option<Value>>,
    /// Produced by a batched fan-out rather than a single request
    pub batched: bool,
}

impl FanOutResult {
    pub fn get(&self, command: &str) -> Option<&Value> {
        self.responses.get(command).and_then(Option::as_ref)
    }

    pub fn contains(&self, command: &str) -> bool {
        self.responses.contains_key(command)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// Telemetry snapshot of one miner, as emitted by pollers
#[derive(Debug, Clone, Serialize)]
pub struct MinerSnapshot {
    pub ip: IpAddr,
    pub model: String,
    pub collected_at: DateTime<Utc>,
    pub fields: AggregationResult,
}

impl MinerSnapshot {
    pub fn new(ip: IpAddr, model: impl Into<String>, fields: AggregationResult) -> Self {
        Self {
            ip,
            model: model.into(),
            collected_at: Utc::now(),
            fields,
        }
    }
}
