//! Trip-vehicle assignment core for on-demand ride sharing.
//!
//! A round takes a snapshot of open requests and vehicles, builds the RV
//! graph ([`graph::RvGraph`]), enumerates feasible trips per vehicle
//! ([`graph::RtvGraph`]) and selects one visit per vehicle with an
//! [`matching::AssignmentStrategy`]. [`round::run_round`] ties the phases
//! together; the ECS layer ([`ecs`], [`systems`], [`runner`]) replays rounds
//! over a simulated horizon.

pub mod clock;
pub mod config;
pub mod ecs;
pub mod error;
pub mod feasibility;
pub mod graph;
pub mod insertion;
pub mod matching;
pub mod model;
pub mod oracle;
pub mod profiling;
pub mod round;
pub mod runner;
pub mod scenario;
pub mod solver;
pub mod systems;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
