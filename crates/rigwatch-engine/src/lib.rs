//! rigwatch Engine - Telemetry aggregation
//!
//! Given a list of requested fields, the aggregator:
//! - resolves the distinct shared resources those fields depend on
//! - fetches each resource once, concurrently
//! - runs every field's extractor concurrently against the fetched resources
//! - isolates per-field failures so one bad endpoint never sinks the round

pub mod aggregator;
pub mod extract;

pub use aggregator::{Aggregator, DEFAULT_EXTRACT_TIMEOUT_MS};
pub use extract::{
    extractor, lookup, Dependencies, ExtractError, ExtractResult, Extractor, Registry, Resource,
    SharedExtractor,
};
