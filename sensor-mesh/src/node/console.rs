//! Console action log
//!
//! One entry per received report:
//!
//! ```text
//! log:
//! temperature sensor in (6,5)
//! measurement: 30.0000
//! action: correction of 0.2500
//!
//! ```

use crate::core::types::SensorReport;
use crate::node::correction::Action;
use std::io::{self, Write};

/// Write the entry for `report` and the action it caused
pub fn write_entry<W: Write>(out: &mut W, report: &SensorReport, action: &Action) -> io::Result<()> {
    writeln!(out, "log:")?;
    writeln!(
        out,
        "{} sensor in ({},{})",
        report.kind,
        report.coord.x(),
        report.coord.y()
    )?;
    writeln!(out, "measurement: {:.4}", report.measurement)?;
    writeln!(out, "action: {}", action)?;
    writeln!(out)?;
    out.flush()
}
