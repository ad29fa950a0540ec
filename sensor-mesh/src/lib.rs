//! Sensor mesh - geo-located sensors smoothing their readings through a relay
//!
//! Two cooperating halves:
//!
//! - **Relay** ([`relay`]): keeps a registry of live connections and fans each
//!   report out to every connection of the same sensor kind. A dropped
//!   connection becomes a synthesized disconnect report.
//! - **Node** ([`node`]): emits its own report on a fixed cadence, tracks
//!   same-kind neighbors, and nudges its measurement toward any of its three
//!   nearest neighbors when they report.
//!
//! Reports travel as fixed 24-byte records ([`streaming::wire`]).

pub mod config;
pub mod core;
pub mod error;
pub mod node;
pub mod relay;
pub mod streaming;

// Re-export commonly used types
pub use crate::core::types::{Coord, SensorKind, SensorReport};
pub use config::{IpVersion, NodeConfig, RelayConfig};
pub use error::{Error, Result};
