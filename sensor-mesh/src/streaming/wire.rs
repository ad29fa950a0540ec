//! Fixed-size binary codec for sensor reports
//!
//! # Record Layout
//!
//! Every report travels as one 24-byte record, sent and received whole:
//!
//! ```text
//! ┌───────────────────────┬──────────┬──────────┬──────────────────┐
//! │ Type tag (12 bytes)   │ x (i32)  │ y (i32)  │ measurement (f32)│
//! │ NUL-padded ASCII      │ native   │ native   │ native IEEE-754  │
//! └───────────────────────┴──────────┴──────────┴──────────────────┘
//!   0                     12         16         20                24
//! ```
//!
//! ## Byte Order
//!
//! No normalization: integers and the float use the host's native byte order,
//! so both ends of a connection must share it.
//!
//! ## Error Handling
//!
//! - **Zero-byte read**: Clean end of stream (`Ok(None)`)
//! - **Short read**: [`Error::TruncatedReport`], never buffered for reassembly
//! - **Unknown tag / off-grid coordinates / non-finite measurement**: [`Error::InvalidReport`]

use crate::core::types::{Coord, SensorKind, SensorReport};
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};

/// Size of the NUL-padded type tag field
pub const TYPE_TAG_LEN: usize = 12;

/// Size of one encoded report
pub const REPORT_LEN: usize = TYPE_TAG_LEN + 4 + 4 + 4;

const X_OFFSET: usize = TYPE_TAG_LEN;
const Y_OFFSET: usize = X_OFFSET + 4;
const MEASUREMENT_OFFSET: usize = Y_OFFSET + 4;

/// Encode a report into its wire record
pub fn encode(report: &SensorReport) -> [u8; REPORT_LEN] {
    let mut buf = [0u8; REPORT_LEN];

    let tag = report.kind.as_str().as_bytes();
    buf[..tag.len()].copy_from_slice(tag);

    buf[X_OFFSET..Y_OFFSET].copy_from_slice(&report.coord.x().to_ne_bytes());
    buf[Y_OFFSET..MEASUREMENT_OFFSET].copy_from_slice(&report.coord.y().to_ne_bytes());
    buf[MEASUREMENT_OFFSET..].copy_from_slice(&report.measurement.to_ne_bytes());

    buf
}

/// Decode a wire record into a report
pub fn decode(buf: &[u8; REPORT_LEN]) -> Result<SensorReport> {
    let tag_field = &buf[..TYPE_TAG_LEN];
    let tag_len = tag_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(TYPE_TAG_LEN);
    let tag = std::str::from_utf8(&tag_field[..tag_len])
        .map_err(|_| Error::InvalidReport("type tag is not valid UTF-8".to_string()))?;
    let kind: SensorKind = tag
        .parse()
        .map_err(|_| Error::InvalidReport(format!("unknown type tag {:?}", tag)))?;

    let x = i32::from_ne_bytes(read_field(buf, X_OFFSET));
    let y = i32::from_ne_bytes(read_field(buf, Y_OFFSET));
    let coord = Coord::new(x, y)
        .map_err(|_| Error::InvalidReport(format!("coordinates ({},{}) off grid", x, y)))?;

    let measurement = f32::from_ne_bytes(read_field(buf, MEASUREMENT_OFFSET));
    if !measurement.is_finite() {
        return Err(Error::InvalidReport(format!(
            "non-finite measurement {}",
            measurement
        )));
    }

    Ok(SensorReport::new(kind, coord, measurement))
}

#[inline]
fn read_field(buf: &[u8; REPORT_LEN], offset: usize) -> [u8; 4] {
    [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]
}

/// Read one report with a single read call.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly.
pub fn read_report<R: Read>(reader: &mut R) -> Result<Option<SensorReport>> {
    let mut buf = [0u8; REPORT_LEN];
    let n = loop {
        match reader.read(&mut buf) {
            Ok(n) => break n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    };

    match n {
        0 => Ok(None),
        REPORT_LEN => decode(&buf).map(Some),
        actual => Err(Error::TruncatedReport {
            expected: REPORT_LEN,
            actual,
        }),
    }
}

/// Write one report as a single record
pub fn write_report<W: Write>(writer: &mut W, report: &SensorReport) -> Result<()> {
    writer.write_all(&encode(report))?;
    Ok(())
}
