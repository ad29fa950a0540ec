//! Local sensor state shared by the emitter and receiver duties

use crate::core::types::{Coord, SensorKind, SensorReport};
use crate::node::correction::{Action, apply_report};
use crate::node::neighbors::{NeighborRecord, NeighborStore};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Identity, current measurement and cadence of the local sensor
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSensorState {
    pub kind: SensorKind,
    pub coord: Coord,
    pub measurement: f32,
    pub emit_interval: Duration,
}

impl LocalSensorState {
    /// State with a known measurement and the kind's emit interval
    pub fn new(kind: SensorKind, coord: Coord, measurement: f32) -> Self {
        Self {
            kind,
            coord,
            measurement,
            emit_interval: kind.emit_interval(),
        }
    }

    /// State with a measurement drawn uniformly from the kind's range
    pub fn random<R: Rng>(kind: SensorKind, coord: Coord, rng: &mut R) -> Self {
        let range = kind.range();
        Self::new(kind, coord, rng.gen_range(range.min..=range.max))
    }

    /// Like [`random`](Self::random), seeding a small RNG.
    ///
    /// A seed of 0 draws from OS entropy; anything else is reproducible.
    pub fn seeded(kind: SensorKind, coord: Coord, seed: u64) -> Self {
        let mut rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self::random(kind, coord, &mut rng)
    }

    /// Override the emit interval
    pub fn with_emit_interval(mut self, interval: Duration) -> Self {
        self.emit_interval = interval;
        self
    }

    /// Report describing the current state
    pub fn report(&self) -> SensorReport {
        SensorReport::new(self.kind, self.coord, self.measurement)
    }
}

#[derive(Debug)]
struct NodeState {
    local: LocalSensorState,
    neighbors: NeighborStore,
}

/// A sensor node: local state and neighbor store behind a single lock.
///
/// Shared (via `Arc`) by the emitter and receiver duties of a session.
#[derive(Debug)]
pub struct SensorNode {
    state: Mutex<NodeState>,
}

impl SensorNode {
    pub fn new(local: LocalSensorState, neighbor_capacity: usize) -> Self {
        Self {
            state: Mutex::new(NodeState {
                local,
                neighbors: NeighborStore::new(neighbor_capacity),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Consistent snapshot of the local report, for the emitter
    pub fn snapshot(&self) -> SensorReport {
        self.lock().local.report()
    }

    /// Run the correction engine on a received report
    pub fn handle_report(&self, report: &SensorReport) -> Action {
        let mut state = self.lock();
        let NodeState { local, neighbors } = &mut *state;
        apply_report(local, neighbors, report)
    }

    pub fn local(&self) -> LocalSensorState {
        self.lock().local.clone()
    }

    pub fn measurement(&self) -> f32 {
        self.lock().local.measurement
    }

    pub fn emit_interval(&self) -> Duration {
        self.lock().local.emit_interval
    }

    pub fn neighbor(&self, coord: &Coord) -> Option<NeighborRecord> {
        self.lock().neighbors.get(coord).copied()
    }

    pub fn neighbor_count(&self) -> usize {
        self.lock().neighbors.len()
    }

    /// Coordinates of the current nearest neighbors, nearest first
    pub fn nearest(&self) -> Vec<Coord> {
        let state = self.lock();
        state
            .neighbors
            .top3(&state.local.coord)
            .into_iter()
            .filter_map(|pos| state.neighbors.record(pos).map(|record| record.coord))
            .collect()
    }
}
