//! Test helpers for common test setup and utilities.
//!
//! Fixtures here live on a line network: node `i` sits `i * hop` seconds from
//! node 0 in both directions, which keeps expected arrival times easy to work
//! out by hand.

use std::sync::Arc;

use bevy_ecs::prelude::World;
use h3o::CellIndex;

use crate::config::MatchingConfig;
use crate::ecs::RoundSchedule;
use crate::model::{NodeId, Request, RequestId, Seconds, TimeWindow, Vehicle, VehicleId};
use crate::oracle::{DistanceOracle, MatrixOracle};
use crate::round::RoundContext;
use crate::scenario::insert_round_resources;

/// A standard test cell used across test files for consistency.
/// This is a valid H3 cell at resolution 9 in the San Francisco Bay Area.
pub const TEST_CELL: u64 = 0x8a1fb46622dffff;

/// Get the test cell as a `CellIndex`.
///
/// # Panics
///
/// Panics if the test cell constant is invalid (should never happen).
pub fn test_cell() -> CellIndex {
    CellIndex::try_from(TEST_CELL).expect("TEST_CELL should be a valid H3 cell")
}

/// Symmetric line network of `nodes` nodes, `hop` seconds between neighbours.
pub fn line_oracle(nodes: usize, hop: Seconds) -> MatrixOracle {
    MatrixOracle::from_fn(nodes, |from, to| {
        Seconds::try_from(from.abs_diff(to))
            .ok()
            .map(|hops| hops * hop)
    })
}

/// One-seat sharing request with explicit windows and a known direct travel time.
pub fn test_request(
    id: u32,
    origin: u32,
    destination: u32,
    pickup: (Seconds, Seconds),
    dropoff: (Seconds, Seconds),
    direct_travel: Seconds,
) -> Request {
    Request::with_windows(
        RequestId(id),
        NodeId(origin),
        NodeId(destination),
        TimeWindow::new(pickup.0, pickup.1),
        TimeWindow::new(dropoff.0, dropoff.1),
    )
    .direct_travel(direct_travel)
}

/// Idle vehicle available from time 0.
pub fn test_vehicle(id: u32, capacity: u32, position: u32) -> Vehicle {
    Vehicle::new(VehicleId(id), capacity, NodeId(position), 0)
}

/// Sequential single-threaded config so results do not depend on pool scheduling.
pub fn test_config() -> MatchingConfig {
    MatchingConfig::default()
        .with_parallel(false)
        .with_rtv_timeout_ms(10_000)
}

/// Create a world holding every round resource, without entities or queued events.
pub fn create_test_world(oracle: Arc<dyn DistanceOracle>, config: MatchingConfig) -> World {
    let mut world = World::new();
    insert_round_resources(
        &mut world,
        RoundContext::new(config, oracle),
        RoundSchedule::default(),
    );
    world
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_is_valid() {
        let cell = test_cell();
        assert_eq!(cell, CellIndex::try_from(TEST_CELL).unwrap());
    }

    #[test]
    fn line_oracle_is_symmetric() {
        let oracle = line_oracle(5, 10);
        assert_eq!(oracle.travel_secs(NodeId(1), NodeId(4)), Some(30));
        assert_eq!(oracle.travel_secs(NodeId(4), NodeId(1)), Some(30));
        assert_eq!(oracle.travel_secs(NodeId(2), NodeId(2)), Some(0));
    }

    #[test]
    fn test_world_has_round_resources() {
        let world = create_test_world(Arc::new(line_oracle(3, 10)), test_config());
        assert!(world.get_resource::<crate::clock::RoundClock>().is_some());
        assert!(world
            .get_resource::<crate::ecs::MatchingContextResource>()
            .is_some());
        assert!(world.get_resource::<crate::ecs::LastRoundResult>().is_some());
    }
}
