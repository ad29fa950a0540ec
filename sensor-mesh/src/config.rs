//! Configuration for the relay and node binaries
//!
//! Both load from an optional TOML file; every section falls back to its
//! defaults, and command-line values override what the file says.

use crate::core::types::{Coord, SensorKind};
use crate::error::{Error, Result};
use crate::node::neighbors::DEFAULT_NEIGHBOR_CAPACITY;
use crate::relay::broadcast::DEFAULT_OUTBOUND_QUEUE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// IP version the relay listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IpVersion {
    #[default]
    #[serde(rename = "v4")]
    V4,
    #[serde(rename = "v6")]
    V6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

impl FromStr for IpVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "v4" => Ok(IpVersion::V4),
            "v6" => Ok(IpVersion::V6),
            other => Err(Error::InvalidIpVersion(other.to_string())),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter (trace, debug, info, warn, error); `RUST_LOG` wins
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// Relay
// ============================================================================

/// Top-level relay configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub network: NetworkConfig,
    pub relay: RelaySettings,
    pub logging: LoggingConfig,
}

/// Listening socket
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ip_version: IpVersion,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip_version: IpVersion::V4,
            port: 51511,
        }
    }
}

/// Fan-out tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Reports buffered per connection before new ones are dropped for it
    pub outbound_queue_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.relay.outbound_queue_capacity == 0 {
            return Err(Error::InvalidParameter(
                "relay.outbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Node
// ============================================================================

/// Top-level node configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub sensor: SensorConfig,
    pub neighbors: NeighborsConfig,
    pub logging: LoggingConfig,
}

/// Relay to connect to
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 51511,
        }
    }
}

/// Local sensor identity
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub x: i32,
    pub y: i32,
    /// Seed for the initial measurement; 0 draws from OS entropy
    pub seed: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Temperature,
            x: 0,
            y: 0,
            seed: 0,
        }
    }
}

impl SensorConfig {
    pub fn coord(&self) -> Result<Coord> {
        Coord::new(self.x, self.y)
    }
}

/// Neighbor store sizing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeighborsConfig {
    pub capacity: usize,
}

impl Default for NeighborsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_NEIGHBOR_CAPACITY,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.sensor.coord()?;
        if self.neighbors.capacity == 0 {
            return Err(Error::InvalidParameter(
                "neighbors.capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
