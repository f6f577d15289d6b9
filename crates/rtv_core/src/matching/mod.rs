//! Assignment strategies: pick one visit per vehicle from the RTV graph.
//!
//! Both strategies consume the same [`AssignmentInput`] and produce an
//! [`Assignment`]; [`Assignment::resolve`] turns it into the serviced,
//! rejected, displaced and disrupted sets of a round.

pub mod exact;
pub mod greedy;
pub mod result;

use crate::config::{AssignmentKind, MatchingConfig};
use crate::graph::RtvGraph;
use crate::model::{Request, RequestId, Vehicle, VehicleId};

pub use exact::ExactAssignment;
pub use greedy::GreedyAssignment;
pub use result::{Assignment, AssignmentOutcome, Resolution};

/// Everything a strategy may look at.
#[derive(Clone, Copy)]
pub struct AssignmentInput<'a> {
    pub rtv: &'a RtvGraph,
    pub requests: &'a [Request],
    pub vehicles: &'a [Vehicle],
}

impl<'a> AssignmentInput<'a> {
    pub fn new(rtv: &'a RtvGraph, requests: &'a [Request], vehicles: &'a [Vehicle]) -> Self {
        Self {
            rtv,
            requests,
            vehicles,
        }
    }

    /// Round requests currently riding on `vehicle`'s visit, sorted.
    pub fn retained_by(&self, vehicle: VehicleId) -> Vec<RequestId> {
        let mut retained: Vec<RequestId> = self
            .requests
            .iter()
            .filter(|request| request.assigned_vehicle == Some(vehicle))
            .map(|request| request.id)
            .collect();
        retained.sort_unstable();
        retained
    }

    /// Requests that must be covered this round.
    pub fn committed(&self) -> impl Iterator<Item = &'a Request> + 'a {
        self.requests.iter().filter(|request| request.previously_assigned)
    }
}

/// Trait for strategies selecting at most one visit per vehicle.
pub trait AssignmentStrategy: Send + Sync {
    /// Short name used in logs and experiment output.
    fn name(&self) -> &'static str;

    /// Choose one visit for every vehicle of the round.
    ///
    /// # Arguments
    ///
    /// * `input` - RTV graph of the round with the request and vehicle snapshots it was built from
    ///
    /// # Returns
    ///
    /// An [`Assignment`] holding exactly one visit per vehicle (degenerate when
    /// the vehicle serves nobody new) and no request in two chosen visits.
    /// Strategies never fail: backend errors and infeasible models end in a
    /// fallback assignment, reported through [`AssignmentOutcome`].
    fn assign(&self, input: &AssignmentInput<'_>) -> Assignment;
}

/// Build the strategy selected by `config`.
pub fn strategy_for(config: &MatchingConfig) -> Box<dyn AssignmentStrategy> {
    match config.assignment {
        AssignmentKind::Exact => Box::new(ExactAssignment::from_config(config)),
        AssignmentKind::Greedy => Box::new(GreedyAssignment::new()),
    }
}
