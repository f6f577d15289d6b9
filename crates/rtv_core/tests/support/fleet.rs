#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use rtv_core::model::{Request, RequestId, Stop, Vehicle, VehicleId};
use rtv_core::round::{check_visit, RoundResult};

/// Assert the route and assignment invariants every round result must hold.
pub fn assert_round_invariants(result: &RoundResult, requests: &[Request], vehicles: &[Vehicle]) {
    assert!(
        result.violations.is_empty(),
        "round reported violations: {:?}",
        result.violations
    );

    let mut seen: HashMap<RequestId, VehicleId> = HashMap::new();
    for vehicle in vehicles {
        let visit = result
            .visit_of(vehicle.id)
            .unwrap_or_else(|| panic!("{} has no visit", vehicle.id));
        assert_eq!(visit.vehicle, vehicle.id);
        if let Err(problem) = check_visit(visit, vehicle) {
            panic!("invalid visit: {problem}");
        }
        assert_sharing_respected(&visit.stops, vehicle);
        for request in &visit.requests {
            if let Some(other) = seen.insert(*request, vehicle.id) {
                panic!("{request} served by {other} and {}", vehicle.id);
            }
        }
    }

    let resolution = &result.resolution;
    for request in requests {
        let served = resolution.serviced.contains_key(&request.id);
        let rejected = resolution.rejected.contains(&request.id);
        let displaced = resolution.displaced.contains(&request.id);
        assert_eq!(
            usize::from(served) + usize::from(rejected) + usize::from(displaced),
            1,
            "{} must be classified exactly once",
            request.id
        );
        if request.previously_assigned {
            assert!(!rejected, "committed {} was rejected", request.id);
        }
    }
}

/// No request's stop directly follows the pickup of a different request
/// that refuses sharing.
pub fn assert_sharing_respected(stops: &[Stop], vehicle: &Vehicle) {
    for pair in stops.windows(2) {
        if let Stop::Pickup(owner) = pair[0] {
            assert!(
                owner.shareable || pair[1].request() == Some(owner.request),
                "{}: private pickup of {} followed by {:?}",
                vehicle.id,
                owner.request,
                pair[1]
            );
        }
    }
}

/// Ids of `requests`.
pub fn ids(requests: &[Request]) -> BTreeSet<RequestId> {
    requests.iter().map(|request| request.id).collect()
}
