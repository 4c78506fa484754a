//! rigwatch Web - HTTP command transport for mining devices
//!
//! Devices expose each command as a path segment on a fixed port. This crate
//! provides the single-request transport, the concurrent command fan-out and
//! typed wrappers for the ePIC firmware command set.

pub mod api;
pub mod fanout;
pub mod transport;

pub use api::EpicWebApi;
pub use fanout::fan_out;
pub use transport::{HttpTransport, Transport, TransportError, DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
