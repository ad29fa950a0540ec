//! Node (client) side: neighbor store, correction engine and session duties

pub mod console;
pub mod correction;
pub mod neighbors;
pub mod session;
pub mod state;

pub use correction::{Action, CORRECTION_GAIN, apply_report};
pub use neighbors::{DEFAULT_NEIGHBOR_CAPACITY, NEAREST_COUNT, NeighborRecord, NeighborStore};
pub use session::{Session, connect};
pub use state::{LocalSensorState, SensorNode};
