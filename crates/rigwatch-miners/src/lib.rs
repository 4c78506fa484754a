//! rigwatch Miners - Device backends
//!
//! A backend is a field registry plus model data. Model variants are plain
//! data in a lookup table rather than types.

pub mod backend;
pub mod epic;
pub mod model;

pub use backend::{BackendError, ConnectionSettings, MinerBackend};
pub use model::{find_model, MinerModel, EPIC_MODELS};
