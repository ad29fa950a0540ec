//! Correction engine
//!
//! Decides what an incoming report does to the local sensor:
//!
//! | Condition (checked in order) | Store | Local measurement | Action |
//! |------------------------------|-------|-------------------|--------|
//! | Sender at our coordinates | untouched | untouched | `same location` |
//! | Sender of another kind | untouched | untouched | `not neighbor` |
//! | Disconnect sentinel | record removed | untouched | `removed` |
//! | Store full, sender unknown | untouched | untouched | `not neighbor` |
//! | Sender outside top 3 | upserted | untouched | `not neighbor` |
//! | Sender in top 3 | upserted | nudged toward sender, clamped | `correction of <delta>` |
//!
//! The nudge is `0.1 * (sender - local) / (distance + 1)`.

use crate::core::types::SensorReport;
use crate::node::neighbors::NeighborStore;
use crate::node::state::LocalSensorState;
use std::fmt;

/// Weight of a neighbor's difference in one correction step
pub const CORRECTION_GAIN: f32 = 0.1;

/// Observable outcome of handling one report
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    SameLocation,
    Removed,
    NotNeighbor,
    /// Applied delta (post-clamp value minus value before correction)
    Correction(f32),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SameLocation => f.write_str("same location"),
            Action::Removed => f.write_str("removed"),
            Action::NotNeighbor => f.write_str("not neighbor"),
            Action::Correction(delta) => write!(f, "correction of {:.4}", delta),
        }
    }
}

/// Apply `report` to the local state and neighbor store.
///
/// Callers must hold whatever lock guards both, so the whole decision is atomic.
pub fn apply_report(
    local: &mut LocalSensorState,
    neighbors: &mut NeighborStore,
    report: &SensorReport,
) -> Action {
    if report.coord == local.coord {
        return Action::SameLocation;
    }

    if report.kind != local.kind {
        log::debug!(
            "Ignoring {} report from {} (local sensor is {})",
            report.kind,
            report.coord,
            local.kind
        );
        return Action::NotNeighbor;
    }

    if report.is_disconnect() {
        neighbors.remove(&report.coord);
        return Action::Removed;
    }

    let Some(pos) = neighbors.upsert(report.coord, report.measurement) else {
        log::debug!("Neighbor store full, {} not tracked", report.coord);
        return Action::NotNeighbor;
    };

    if !neighbors.top3(&local.coord).contains(&pos) {
        return Action::NotNeighbor;
    }

    let before = local.measurement;
    let distance = local.coord.distance(&report.coord);
    let correction = CORRECTION_GAIN * (report.measurement - before) / (distance + 1.0);
    local.measurement = local.kind.range().clamp(before + correction);

    Action::Correction(local.measurement - before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Coord, SensorKind};
    use crate::node::neighbors::DEFAULT_NEIGHBOR_CAPACITY;
    use approx::assert_relative_eq;

    fn coord(x: i32, y: i32) -> Coord {
        Coord::new(x, y).unwrap()
    }

    fn temperature_at(x: i32, y: i32, measurement: f32) -> LocalSensorState {
        LocalSensorState::new(SensorKind::Temperature, coord(x, y), measurement)
    }

    fn temp_report(x: i32, y: i32, m: f32) -> SensorReport {
        SensorReport::new(SensorKind::Temperature, coord(x, y), m)
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::SameLocation.to_string(), "same location");
        assert_eq!(Action::Removed.to_string(), "removed");
        assert_eq!(Action::NotNeighbor.to_string(), "not neighbor");
        assert_eq!(Action::Correction(0.125).to_string(), "correction of 0.1250");
        assert_eq!(Action::Correction(-0.3).to_string(), "correction of -0.3000");
    }

    #[test]
    fn test_first_neighbor_corrects() {
        let mut local = temperature_at(5, 5, 25.0);
        let mut store = NeighborStore::default();

        let action = apply_report(&mut local, &mut store, &temp_report(6, 5, 30.0));

        // 0.1 * (30 - 25) / (1 + 1)
        match action {
            Action::Correction(delta) => assert_relative_eq!(delta, 0.25),
            other => panic!("expected correction, got {:?}", other),
        }
        assert_relative_eq!(local.measurement, 25.25);
        assert_eq!(store.len(), 1);
        assert_eq!(store.top3(&local.coord), vec![0]);
    }

    #[test]
    fn test_same_location_leaves_everything() {
        let mut local = temperature_at(5, 5, 25.0);
        let mut store = NeighborStore::default();

        let action = apply_report(&mut local, &mut store, &temp_report(5, 5, 25.0));
        assert_eq!(action, Action::SameLocation);
        assert!(store.is_empty());
        assert_eq!(local.measurement, 25.0);
    }

    #[test]
    fn test_full_store_new_sender_is_not_neighbor() {
        let mut local = temperature_at(0, 0, 25.0);
        let mut store = NeighborStore::default();
        for i in 0..DEFAULT_NEIGHBOR_CAPACITY as i32 {
            store.upsert(coord(i % 10, 1 + i / 10), 30.0);
        }

        let action = apply_report(&mut local, &mut store, &temp_report(9, 9, 22.0));
        assert_eq!(action, Action::NotNeighbor);
        assert_eq!(store.len(), DEFAULT_NEIGHBOR_CAPACITY);
        assert_eq!(local.measurement, 25.0);
    }

    #[test]
    fn test_sentinel_removes_neighbor() {
        let mut local = temperature_at(5, 5, 25.0);
        let mut store = NeighborStore::default();
        apply_report(&mut local, &mut store, &temp_report(6, 5, 30.0));
        let before = local.measurement;

        let action = apply_report(&mut local, &mut store, &temp_report(6, 5, -1.0));
        assert_eq!(action, Action::Removed);
        assert!(store.get(&coord(6, 5)).is_none());
        assert!(store.top3(&local.coord).is_empty());
        assert_eq!(local.measurement, before);
    }

    #[test]
    fn test_sentinel_for_unknown_sender_still_removed() {
        let mut local = temperature_at(5, 5, 25.0);
        let mut store = NeighborStore::default();
        let action = apply_report(&mut local, &mut store, &temp_report(1, 1, -1.0));
        assert_eq!(action, Action::Removed);
        assert!(store.is_empty());
    }

    #[test]
    fn test_distant_sender_is_not_neighbor() {
        let mut local = temperature_at(5, 5, 25.0);
        let mut store = NeighborStore::default();
        apply_report(&mut local, &mut store, &temp_report(6, 5, 25.0));
        apply_report(&mut local, &mut store, &temp_report(4, 5, 25.0));
        apply_report(&mut local, &mut store, &temp_report(5, 6, 25.0));
        let before = local.measurement;

        let action = apply_report(&mut local, &mut store, &temp_report(0, 0, 40.0));
        assert_eq!(action, Action::NotNeighbor);
        assert_eq!(store.len(), 4);
        assert_eq!(local.measurement, before);
    }

    #[test]
    fn test_correction_is_clamped_to_range() {
        let mut local = LocalSensorState::new(SensorKind::AirQuality, coord(5, 5), 15.0);
        let mut store = NeighborStore::default();

        // Neighbor far below the range pulls down, clamp holds the floor
        let report = SensorReport::new(SensorKind::AirQuality, coord(5, 6), 0.0);
        let action = apply_report(&mut local, &mut store, &report);
        assert_eq!(action, Action::Correction(0.0));
        assert_eq!(local.measurement, 15.0);
    }

    #[test]
    fn test_foreign_kind_ignored() {
        let mut local = temperature_at(5, 5, 25.0);
        let mut store = NeighborStore::default();
        let report = SensorReport::new(SensorKind::Humidity, coord(6, 5), 80.0);

        assert_eq!(
            apply_report(&mut local, &mut store, &report),
            Action::NotNeighbor
        );
        assert!(store.is_empty());
    }
}
