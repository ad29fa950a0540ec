//! Bounded store of same-kind neighbors, keyed by coordinate
//!
//! The store has no lock of its own: it lives inside [`SensorNode`]'s mutex
//! together with the local sensor state, so every operation (and the top-3
//! scan in particular) runs against a store nobody else is mutating.
//!
//! [`SensorNode`]: crate::node::state::SensorNode

use crate::core::types::Coord;

/// Default maximum number of neighbors tracked
pub const DEFAULT_NEIGHBOR_CAPACITY: usize = 50;

/// Number of nearest neighbors that may correct the local measurement
pub const NEAREST_COUNT: usize = 3;

/// Last known state of one neighbor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborRecord {
    pub coord: Coord,
    pub measurement: f32,
}

/// Bounded neighbor collection.
///
/// At most one record per coordinate. Record order carries no meaning except
/// as the tie-breaker in [`NeighborStore::top3`].
#[derive(Debug, Clone)]
pub struct NeighborStore {
    records: Vec<NeighborRecord>,
    capacity: usize,
}

impl NeighborStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Update the record at `coord` in place, or append a new one.
    ///
    /// Returns the record's position, or `None` when the key is new and the
    /// store is already full (the store is left unchanged).
    pub fn upsert(&mut self, coord: Coord, measurement: f32) -> Option<usize> {
        if let Some(pos) = self.position(&coord) {
            self.records[pos].measurement = measurement;
            return Some(pos);
        }

        if self.records.len() >= self.capacity {
            return None;
        }

        self.records.push(NeighborRecord { coord, measurement });
        Some(self.records.len() - 1)
    }

    /// Remove the record at `coord`, moving the last record into its slot.
    ///
    /// Returns false when no such record exists.
    pub fn remove(&mut self, coord: &Coord) -> bool {
        match self.position(coord) {
            Some(pos) => {
                self.records.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Positions of the (up to) three records nearest to `origin`, nearest first.
    ///
    /// Each round picks the smallest distance among records not yet chosen;
    /// on equal distance the lower position wins.
    pub fn top3(&self, origin: &Coord) -> Vec<usize> {
        let distances: Vec<f32> = self
            .records
            .iter()
            .map(|record| record.coord.distance(origin))
            .collect();

        let mut chosen = vec![false; distances.len()];
        let mut nearest = Vec::with_capacity(NEAREST_COUNT);

        for _ in 0..NEAREST_COUNT {
            let mut best: Option<(usize, f32)> = None;
            for (i, &d) in distances.iter().enumerate() {
                if chosen[i] {
                    continue;
                }
                if best.is_none_or(|(_, best_d)| d < best_d) {
                    best = Some((i, d));
                }
            }

            let Some((i, _)) = best else {
                break;
            };
            chosen[i] = true;
            nearest.push(i);
        }

        nearest
    }

    fn position(&self, coord: &Coord) -> Option<usize> {
        self.records.iter().position(|record| record.coord == *coord)
    }

    pub fn get(&self, coord: &Coord) -> Option<&NeighborRecord> {
        self.records.iter().find(|record| record.coord == *coord)
    }

    pub fn record(&self, pos: usize) -> Option<&NeighborRecord> {
        self.records.get(pos)
    }

    pub fn records(&self) -> &[NeighborRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }
}

impl Default for NeighborStore {
    fn default() -> Self {
        Self::new(DEFAULT_NEIGHBOR_CAPACITY)
    }
}
