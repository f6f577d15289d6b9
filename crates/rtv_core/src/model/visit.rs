use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::ids::{NodeId, RequestId, Seconds, VehicleId};
use super::stop::Stop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisitKind {
    /// Serves pickups and/or drop-offs.
    Route,
    /// Vehicle stays where it is.
    Stay,
    /// Vehicle moves to a node without serving anyone.
    Relocation,
}

/// A candidate or realized route for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub vehicle: VehicleId,
    pub kind: VisitKind,
    pub stops: Vec<Stop>,
    /// Simulated arrival at each stop, same length as `stops`.
    pub arrivals: Vec<Seconds>,
    /// Requests picked up by this visit, sorted.
    pub requests: Vec<RequestId>,
    /// Boarded passengers dropped off by this visit, sorted.
    pub passengers: Vec<RequestId>,
    /// Sum of drop-off lateness over the visit.
    pub delay: u64,
    /// Time spent waiting for windows to open.
    pub idleness: u64,
    /// Sum of `latest - arrival` over request stops.
    pub slack: u64,
    /// Built with relaxed windows because boarded passengers could no longer be served on time.
    pub forced: bool,
}

impl Visit {
    pub fn stay(vehicle: VehicleId) -> Self {
        Self {
            vehicle,
            kind: VisitKind::Stay,
            stops: Vec::new(),
            arrivals: Vec::new(),
            requests: Vec::new(),
            passengers: Vec::new(),
            delay: 0,
            idleness: 0,
            slack: 0,
            forced: false,
        }
    }

    pub fn relocation(vehicle: VehicleId, node: NodeId, arrival: Seconds) -> Self {
        Self {
            kind: VisitKind::Relocation,
            stops: vec![Stop::Relocation { node }],
            arrivals: vec![arrival],
            ..Self::stay(vehicle)
        }
    }

    /// Number of requests newly served: the RTV level of the visit.
    pub fn level(&self) -> usize {
        self.requests.len()
    }

    /// Stay and relocation visits serve nobody.
    pub fn is_degenerate(&self) -> bool {
        self.kind != VisitKind::Route
    }

    pub fn first_arrival(&self) -> Option<Seconds> {
        self.arrivals.first().copied()
    }

    /// First stop the vehicle is heading to.
    pub fn target_node(&self) -> Option<NodeId> {
        self.stops.first().map(Stop::node)
    }

    pub fn serves(&self, request: RequestId) -> bool {
        self.requests.binary_search(&request).is_ok()
    }

    /// Ranking used everywhere a single best visit is picked.
    ///
    /// Lower delay wins, then shorter sequences, then less idleness. Remaining
    /// ties resolve on the lowest request ids.
    pub fn quality_cmp(&self, other: &Visit) -> Ordering {
        self.quality_key()
            .cmp(&other.quality_key())
            .then_with(|| self.requests.cmp(&other.requests))
    }

    /// `(delay, stop count, idleness)`, the leading terms of [`Self::quality_cmp`].
    /// Every term only grows as stops are appended.
    pub fn quality_key(&self) -> (u64, usize, u64) {
        (self.delay, self.stops.len(), self.idleness)
    }

    pub fn is_better_than(&self, other: &Visit) -> bool {
        self.quality_cmp(other) == Ordering::Less
    }
}
