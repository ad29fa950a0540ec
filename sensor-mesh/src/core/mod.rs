//! Core module - shared data types

pub mod types;

pub use types::{
    Coord, DISCONNECT_SENTINEL, MeasurementRange, SENTINEL_EPSILON, SensorKind, SensorReport,
};
