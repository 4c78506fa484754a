//! rigwatch Core - Core types and field registry
//!
//! This crate provides the foundational types for the rigwatch system:
//! - Telemetry values collected from mining devices (fans, hashboards, pools)
//! - The field registry mapping telemetry fields to extractors and shared resources
//! - Aggregation and fan-out result containers

pub mod registry;
pub mod result;
pub mod value;

pub use registry::{FieldRegistry, FieldSpec, Parameters, RegistryError, Resolution, SharedResourceRef};
pub use result::{AggregationResult, FanOutResult, MinerSnapshot};
pub use value::{Fan, HashBoard, Pool, PoolGroup, Scalar, TelemetryValue};
