//! Two-pass greedy assignment.
//!
//! Vehicles carrying passengers pick first, each taking its largest, least
//! delayed visit whose requests are still free. Remaining vehicles then scan
//! all visits from the highest level down, lowest delay first within a level.
//! A visit is only eligible if it still serves every request its vehicle was
//! already committed to this round.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::model::{RequestId, VehicleId, Visit, VisitId};

use super::result::{Assignment, AssignmentOutcome};
use super::{AssignmentInput, AssignmentStrategy};

#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAssignment;

impl GreedyAssignment {
    pub fn new() -> Self {
        Self
    }

    /// Chosen visit id per vehicle. Vehicles left out get their baseline later.
    pub fn select(&self, input: &AssignmentInput<'_>) -> BTreeMap<VehicleId, VisitId> {
        let rtv = input.rtv;
        let retained: HashMap<VehicleId, Vec<RequestId>> = input
            .vehicles
            .iter()
            .map(|vehicle| (vehicle.id, input.retained_by(vehicle.id)))
            .collect();
        let keeps_retained = |visit: &Visit| {
            retained
                .get(&visit.vehicle)
                .map_or(true, |ids| ids.iter().all(|id| visit.serves(*id)))
        };

        let mut chosen: BTreeMap<VehicleId, VisitId> = BTreeMap::new();
        let mut matched: HashSet<RequestId> = HashSet::new();

        for vehicle in input.vehicles.iter().filter(|vehicle| vehicle.has_passengers()) {
            let mut candidates: Vec<VisitId> = rtv.visits_of(vehicle.id).to_vec();
            candidates.sort_by(|a, b| {
                let (a, b) = (rtv.visit(*a), rtv.visit(*b));
                b.level().cmp(&a.level()).then_with(|| a.quality_cmp(b))
            });
            let pick = candidates
                .iter()
                .copied()
                .find(|id| {
                    let visit = rtv.visit(*id);
                    keeps_retained(visit) && is_free(visit, &matched)
                })
                .or_else(|| {
                    candidates
                        .iter()
                        .copied()
                        .find(|id| rtv.visit(*id).level() == 0)
                });
            match pick {
                Some(id) => take(id, rtv.visit(id), &mut chosen, &mut matched),
                None => warn!(vehicle = %vehicle.id, "no visit keeps boarded passengers on board"),
            }
        }

        let mut pool: Vec<VisitId> = rtv
            .visits()
            .filter(|(_, visit)| !chosen.contains_key(&visit.vehicle))
            .map(|(id, _)| id)
            .collect();
        pool.sort_by(|a, b| {
            let (a, b) = (rtv.visit(*a), rtv.visit(*b));
            b.level()
                .cmp(&a.level())
                .then_with(|| a.quality_cmp(b))
                .then_with(|| a.vehicle.cmp(&b.vehicle))
        });

        for id in pool {
            let visit = rtv.visit(id);
            if chosen.contains_key(&visit.vehicle) || !keeps_retained(visit) {
                continue;
            }
            if !is_free(visit, &matched) {
                continue;
            }
            take(id, visit, &mut chosen, &mut matched);
        }

        debug!(
            vehicles = chosen.len(),
            requests = matched.len(),
            "greedy selection done"
        );
        chosen
    }
}

fn is_free(visit: &Visit, matched: &HashSet<RequestId>) -> bool {
    visit.requests.iter().all(|request| !matched.contains(request))
}

fn take(
    id: VisitId,
    visit: &Visit,
    chosen: &mut BTreeMap<VehicleId, VisitId>,
    matched: &mut HashSet<RequestId>,
) {
    chosen.insert(visit.vehicle, id);
    matched.extend(visit.requests.iter().copied());
}

impl AssignmentStrategy for GreedyAssignment {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn assign(&self, input: &AssignmentInput<'_>) -> Assignment {
        let mut assignment = Assignment::new(AssignmentOutcome::Greedy);
        for id in self.select(input).into_values() {
            assignment.choose(input.rtv.visit(id).clone());
        }
        assignment.complete_with_baselines(input);
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::config::MatchingConfig;
    use crate::graph::{RtvGraph, RvGraph};
    use crate::model::{NodeId, Request, Seconds, TimeWindow, Vehicle};
    use crate::matching::Resolution;
    use crate::oracle::MatrixOracle;

    fn line() -> MatrixOracle {
        MatrixOracle::from_fn(10, |a, b| Some((a.abs_diff(b) * 10) as Seconds))
    }

    fn request(id: u32, from: u32, to: u32, latest_pickup: u32) -> Request {
        Request::with_windows(
            RequestId(id),
            NodeId(from),
            NodeId(to),
            TimeWindow::new(0, latest_pickup),
            TimeWindow::new(0, 600),
        )
        .direct_travel(from.abs_diff(to) * 10)
    }

    fn assign(requests: &[Request], vehicles: &[Vehicle]) -> (Assignment, Resolution) {
        let oracle = line();
        let config = MatchingConfig::default();
        let rv = RvGraph::build(&oracle, 0, requests, vehicles, &config);
        let rtv = RtvGraph::build(&oracle, 0, requests, vehicles, &rv, &config);
        let input = AssignmentInput::new(&rtv, requests, vehicles);
        let assignment = GreedyAssignment::new().assign(&input);
        let resolution = assignment.resolve(&input);
        (assignment, resolution)
    }

    #[test]
    fn larger_trips_are_preferred() {
        let requests = vec![request(1, 1, 4, 100), request(2, 2, 5, 100)];
        let vehicles = vec![
            Vehicle::new(VehicleId(1), 2, NodeId(0), 0),
            Vehicle::new(VehicleId(2), 2, NodeId(2), 0),
        ];
        let (assignment, resolution) = assign(&requests, &vehicles);

        let pooled = assignment
            .visits
            .values()
            .find(|visit| visit.level() == 2)
            .expect("a vehicle takes both requests");
        assert_eq!(pooled.requests, vec![RequestId(1), RequestId(2)]);
        assert_eq!(resolution.serviced.len(), 2);
        assert_eq!(assignment.visits.len(), 2);
    }

    #[test]
    fn every_vehicle_gets_exactly_one_visit_and_requests_are_disjoint() {
        let requests: Vec<Request> = (1..=6).map(|i| request(i, i, 9 - (i % 3), 200)).collect();
        let vehicles: Vec<Vehicle> = (1..=3)
            .map(|i| Vehicle::new(VehicleId(i), 2, NodeId(i * 3), 0))
            .collect();
        let (assignment, resolution) = assign(&requests, &vehicles);

        assert_eq!(assignment.visits.len(), vehicles.len());
        let mut seen = HashSet::new();
        for visit in assignment.visits.values() {
            for request in &visit.requests {
                assert!(seen.insert(*request), "request {request} chosen twice");
            }
        }
        assert_eq!(resolution.serviced.len() + resolution.rejected.len(), requests.len());
    }

    #[test]
    fn vehicles_with_passengers_are_served_first() {
        let boarded = request(9, 0, 3, 0);
        let contested = request(1, 1, 2, 100);
        let carrying = Vehicle::new(VehicleId(5), 2, NodeId(0), 0).with_passenger(boarded.dropoff());
        let idle = Vehicle::new(VehicleId(1), 2, NodeId(0), 0);
        let (assignment, resolution) = assign(&[contested], &[idle, carrying]);

        let carried = assignment.visit_of(VehicleId(5)).expect("visit");
        assert_eq!(carried.passengers, vec![RequestId(9)]);
        assert_eq!(resolution.serviced.get(&RequestId(1)), Some(&VehicleId(5)));
        assert!(assignment.visit_of(VehicleId(1)).expect("visit").is_degenerate());
    }

    #[test]
    fn committed_request_moves_to_a_closer_vehicle() {
        let kept = request(1, 1, 2, 100).assigned_to(VehicleId(2), true);
        let vehicles = vec![
            Vehicle::new(VehicleId(1), 1, NodeId(1), 0),
            Vehicle::new(VehicleId(2), 1, NodeId(0), 0),
        ];
        let (assignment, resolution) = assign(&[kept], &vehicles);

        assert_eq!(resolution.serviced.get(&RequestId(1)), Some(&VehicleId(1)));
        assert!(resolution.displaced.is_empty());
        assert_eq!(resolution.disrupted, BTreeSet::from([VehicleId(2)]));
        assert!(assignment.visit_of(VehicleId(2)).expect("visit").is_degenerate());
    }

    #[test]
    fn vehicle_never_drops_its_own_request_for_a_different_one() {
        // vehicle 1 holds request 1; request 2 alone would be cheaper for it
        let kept = request(1, 5, 6, 50).assigned_to(VehicleId(1), false);
        let tempting = request(2, 0, 9, 100);
        let vehicles = vec![Vehicle::new(VehicleId(1), 1, NodeId(0), 0)];
        let (assignment, resolution) = assign(&[kept, tempting], &vehicles);

        let visit = assignment.visit_of(VehicleId(1)).expect("visit");
        assert!(visit.serves(RequestId(1)));
        assert!(!visit.serves(RequestId(2)));
        assert_eq!(resolution.rejected, BTreeSet::from([RequestId(2)]));
    }
}
