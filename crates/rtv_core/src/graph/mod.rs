//! Compatibility graphs of one round.
//!
//! - [`RvGraph`]: which vehicle can serve which request alone, and which
//!   request pairs can share a trip.
//! - [`RtvGraph`]: every feasible trip per vehicle, level by level, stored in
//!   one visit arena with per-vehicle and per-request indexes.
//! - [`RtvSnapshot`]: serializable summary of both for offline analysis.

pub mod rtv;
pub mod rv;
pub mod snapshot;

pub use rtv::{baseline_visit, enumerate_trips, idle_visit, LevelStats, RtvGraph, VehicleTrips};
pub use rv::{pair_delay, RrEdge, RvEdge, RvGraph};
pub use snapshot::{LevelSnapshot, RtvSnapshot};
