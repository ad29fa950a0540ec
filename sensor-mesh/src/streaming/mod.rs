//! Wire streaming module for the sensor mesh

pub mod wire;

pub use wire::{REPORT_LEN, TYPE_TAG_LEN, decode, encode, read_report, write_report};
