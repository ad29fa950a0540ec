//! Core data types shared by the relay and the sensor nodes.
//!
//! Key types:
//! - [`SensorKind`]: The three sensor categories, with their valid range and cadence
//! - [`Coord`]: A validated position on the 10x10 grid
//! - [`SensorReport`]: One report as it travels over the wire

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Reserved measurement announcing that a sensor left the network
pub const DISCONNECT_SENTINEL: f32 = -1.0;

/// Tolerance used when comparing a measurement with [`DISCONNECT_SENTINEL`]
pub const SENTINEL_EPSILON: f32 = 1e-4;

/// Largest valid grid coordinate (inclusive); the smallest is 0
pub const GRID_MAX: i32 = 9;

/// Sensor category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    AirQuality,
}

impl SensorKind {
    /// All kinds, in wire-tag order
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::AirQuality,
    ];

    /// Name used on the wire and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::AirQuality => "air_quality",
        }
    }

    /// Range a measurement of this kind must stay within
    pub fn range(&self) -> MeasurementRange {
        match self {
            SensorKind::Temperature => MeasurementRange::new(20.0, 40.0),
            SensorKind::Humidity => MeasurementRange::new(10.0, 90.0),
            SensorKind::AirQuality => MeasurementRange::new(15.0, 30.0),
        }
    }

    /// How often a node of this kind emits its own report
    pub fn emit_interval(&self) -> Duration {
        match self {
            SensorKind::Temperature => Duration::from_secs(5),
            SensorKind::Humidity => Duration::from_secs(7),
            SensorKind::AirQuality => Duration::from_secs(10),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidSensorKind(s.to_string()))
    }
}

/// Closed interval of valid measurements for a kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRange {
    pub min: f32,
    pub max: f32,
}

impl MeasurementRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamp a value into the range
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Position on the 10x10 sensor grid.
///
/// Always within `[0, GRID_MAX]` on both axes; the only constructor validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    x: i32,
    y: i32,
}

impl Coord {
    /// Create a coordinate, rejecting anything off the grid
    pub fn new(x: i32, y: i32) -> Result<Self> {
        if (0..=GRID_MAX).contains(&x) && (0..=GRID_MAX).contains(&y) {
            Ok(Self { x, y })
        } else {
            Err(Error::CoordinateOutOfRange { x, y })
        }
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Euclidean distance to another coordinate
    #[inline]
    pub fn distance(&self, other: &Coord) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// One sensor report, exactly as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReport {
    pub kind: SensorKind,
    pub coord: Coord,
    pub measurement: f32,
}

impl SensorReport {
    pub fn new(kind: SensorKind, coord: Coord, measurement: f32) -> Self {
        Self {
            kind,
            coord,
            measurement,
        }
    }

    /// Synthesized notice that the sensor last seen at `coord` went away
    pub fn disconnect(kind: SensorKind, coord: Coord) -> Self {
        Self::new(kind, coord, DISCONNECT_SENTINEL)
    }

    /// True when the measurement is the disconnect sentinel
    #[inline]
    pub fn is_disconnect(&self) -> bool {
        (self.measurement - DISCONNECT_SENTINEL).abs() < SENTINEL_EPSILON
    }
}

impl fmt::Display for SensorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sensor in {} measurement {:.4}",
            self.kind, self.coord, self.measurement
        )
    }
}
