use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::model::{RequestId, VehicleId, Visit};

use super::AssignmentInput;

/// How the chosen visits were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOutcome {
    /// Exact model solved to optimality (within the configured gap).
    Optimal,
    /// Exact model stopped at its time limit with a feasible incumbent.
    Incumbent,
    Greedy,
    /// Previous assignment kept after an infeasible model, a time-out without
    /// incumbent or a backend failure.
    Fallback,
}

/// One visit per vehicle, as decided by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub visits: BTreeMap<VehicleId, Visit>,
    pub outcome: AssignmentOutcome,
    /// Names of conflicting constraints when the exact model was infeasible.
    pub conflict: Vec<String>,
}

/// Round-level sets derived from an [`Assignment`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Request to the vehicle whose visit picks it up.
    pub serviced: BTreeMap<RequestId, VehicleId>,
    /// New requests left uncovered.
    pub rejected: BTreeSet<RequestId>,
    /// Requests that had a vehicle before this round (or were committed
    /// earlier) and are left without one.
    pub displaced: BTreeSet<RequestId>,
    /// Vehicles that lost a request and fall back to a degenerate visit.
    pub disrupted: BTreeSet<VehicleId>,
}

impl Assignment {
    pub fn new(outcome: AssignmentOutcome) -> Self {
        Self {
            visits: BTreeMap::new(),
            outcome,
            conflict: Vec::new(),
        }
    }

    pub fn choose(&mut self, visit: Visit) {
        self.visits.insert(visit.vehicle, visit);
    }

    pub fn visit_of(&self, vehicle: VehicleId) -> Option<&Visit> {
        self.visits.get(&vehicle)
    }

    pub fn total_delay(&self) -> u64 {
        self.visits.values().map(|visit| visit.delay).sum()
    }

    /// Give every vehicle without a visit its baseline visit.
    pub fn complete_with_baselines(&mut self, input: &AssignmentInput<'_>) {
        for vehicle in input.vehicles {
            if !self.visits.contains_key(&vehicle.id) {
                self.choose(baseline_of(input, vehicle.id));
            }
        }
    }

    /// Keep the previous plan: every vehicle stays on its current visit (or
    /// its baseline), nothing new is accepted.
    pub fn fallback(input: &AssignmentInput<'_>, conflict: Vec<String>) -> Self {
        let mut assignment = Self::new(AssignmentOutcome::Fallback);
        assignment.conflict = conflict;
        for vehicle in input.vehicles {
            let visit = vehicle
                .current_visit
                .clone()
                .unwrap_or_else(|| baseline_of(input, vehicle.id));
            assignment.choose(visit);
        }
        assignment
    }

    /// Classify every round request and find disrupted vehicles.
    pub fn resolve(&self, input: &AssignmentInput<'_>) -> Resolution {
        let round: BTreeSet<RequestId> = input.requests.iter().map(|request| request.id).collect();
        let mut resolution = Resolution::default();

        for (vehicle, visit) in &self.visits {
            for request in visit.requests.iter().filter(|id| round.contains(id)) {
                if let Some(other) = resolution.serviced.insert(*request, *vehicle) {
                    error!(
                        request = %request,
                        first = %other,
                        second = %vehicle,
                        "request chosen by two visits"
                    );
                    resolution.serviced.insert(*request, other);
                }
            }
        }

        for request in input.requests {
            if resolution.serviced.contains_key(&request.id) {
                continue;
            }
            if request.previously_assigned {
                warn!(request = %request.id, "committed request left without a visit");
            }
            if request.assigned_vehicle.is_some() || request.previously_assigned {
                resolution.displaced.insert(request.id);
            } else {
                resolution.rejected.insert(request.id);
            }
        }

        for vehicle in input.vehicles {
            let Some(visit) = self.visits.get(&vehicle.id) else {
                continue;
            };
            let lost = input
                .retained_by(vehicle.id)
                .iter()
                .any(|request| !visit.serves(*request));
            if lost && visit.is_degenerate() {
                resolution.disrupted.insert(vehicle.id);
            }
        }
        resolution
    }
}

/// First candidate of the vehicle in the RTV arena, or a stay.
pub(crate) fn baseline_of(input: &AssignmentInput<'_>, vehicle: VehicleId) -> Visit {
    input
        .rtv
        .visits_of(vehicle)
        .first()
        .map(|id| input.rtv.visit(*id).clone())
        .unwrap_or_else(|| Visit::stay(vehicle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RtvGraph;
    use crate::model::{NodeId, Request, Stop, TimeWindow, Vehicle, VisitKind};

    fn request(id: u32) -> Request {
        Request::with_windows(
            RequestId(id),
            NodeId(0),
            NodeId(1),
            TimeWindow::new(0, 100),
            TimeWindow::new(0, 200),
        )
    }

    fn route(vehicle: u32, requests: &[&Request]) -> Visit {
        let mut visit = Visit::stay(VehicleId(vehicle));
        visit.kind = VisitKind::Route;
        for request in requests {
            visit.stops.push(request.pickup());
            visit.stops.push(request.dropoff());
            visit.requests.push(request.id);
        }
        visit.arrivals = vec![0; visit.stops.len()];
        visit.requests.sort_unstable();
        visit
    }

    #[test]
    fn uncovered_requests_split_into_rejected_and_displaced() {
        let served = request(1);
        let fresh = request(2);
        let orphan = request(3).assigned_to(VehicleId(2), false);
        let requests = vec![served.clone(), fresh, orphan];
        let vehicles = vec![
            Vehicle::new(VehicleId(1), 2, NodeId(0), 0),
            Vehicle::new(VehicleId(2), 2, NodeId(0), 0),
        ];
        let rtv = RtvGraph::default();
        let input = AssignmentInput::new(&rtv, &requests, &vehicles);

        let mut assignment = Assignment::new(AssignmentOutcome::Greedy);
        assignment.choose(route(1, &[&served]));
        assignment.complete_with_baselines(&input);
        let resolution = assignment.resolve(&input);

        assert_eq!(resolution.serviced.get(&RequestId(1)), Some(&VehicleId(1)));
        assert_eq!(resolution.rejected, BTreeSet::from([RequestId(2)]));
        assert_eq!(resolution.displaced, BTreeSet::from([RequestId(3)]));
        assert_eq!(resolution.disrupted, BTreeSet::from([VehicleId(2)]));
        assert_eq!(assignment.visits.len(), 2);
    }

    #[test]
    fn fallback_keeps_current_visits() {
        let kept = request(4).assigned_to(VehicleId(1), true);
        let fresh = request(5);
        let mut vehicle = Vehicle::new(VehicleId(1), 2, NodeId(0), 0);
        vehicle.current_visit = Some(route(1, &[&kept]));
        let requests = vec![kept, fresh];
        let vehicles = vec![vehicle, Vehicle::new(VehicleId(2), 1, NodeId(0), 0)];
        let rtv = RtvGraph::default();
        let input = AssignmentInput::new(&rtv, &requests, &vehicles);

        let assignment = Assignment::fallback(&input, vec!["request_4_must_be_served".into()]);
        let resolution = assignment.resolve(&input);

        assert_eq!(assignment.outcome, AssignmentOutcome::Fallback);
        assert_eq!(resolution.serviced.get(&RequestId(4)), Some(&VehicleId(1)));
        assert_eq!(resolution.rejected, BTreeSet::from([RequestId(5)]));
        assert!(resolution.disrupted.is_empty());
        assert_eq!(assignment.visit_of(VehicleId(2)), Some(&Visit::stay(VehicleId(2))));
        assert!(matches!(
            assignment.visit_of(VehicleId(1)).and_then(|v| v.stops.first()),
            Some(Stop::Pickup(_))
        ));
    }
}
