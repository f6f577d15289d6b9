use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MatchingConfig;
use crate::feasibility::StartState;
use crate::insertion::{best_insertion, best_sequence, forced_sequence};
use crate::model::{Request, RequestId, Seconds, Stop, Vehicle, VehicleId, Visit, VisitId};
use crate::oracle::DistanceOracle;

use super::rv::RvGraph;

/// Trip-search counters for one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    /// Candidate trips generated from the level below.
    pub candidates: usize,
    /// Candidates dropped because a sub-trip was missing one level down.
    pub pruned: usize,
    /// Candidates with a feasible route.
    pub feasible: usize,
}

impl LevelStats {
    fn merge(&mut self, other: &LevelStats) {
        self.candidates += other.candidates;
        self.pruned += other.pruned;
        self.feasible += other.feasible;
    }
}

/// Result of one vehicle's trip search.
#[derive(Debug, Clone)]
pub struct VehicleTrips {
    pub vehicle: VehicleId,
    /// Feasible trips per level, keyed by sorted request ids. Level 0 holds
    /// the degenerate or passengers-only visit.
    pub levels: Vec<BTreeMap<Vec<RequestId>, Visit>>,
    pub stats: Vec<LevelStats>,
    pub timed_out: bool,
}

impl VehicleTrips {
    fn trip_count(&self) -> usize {
        self.levels.iter().map(BTreeMap::len).sum()
    }
}

/// Enumerate every feasible trip of `vehicle`, level by level.
///
/// Level 1 comes from the vehicle's RV edges. Level 2 joins level-1 requests
/// that also share an RR edge. Level `k >= 3` extends each level `k - 1` trip
/// with a higher-id level-1 request, keeping only candidates whose every
/// `k - 1` sub-trip is already feasible. The wall-clock budget is checked
/// between levels; a level in progress always completes.
pub fn enumerate_trips(
    oracle: &dyn DistanceOracle,
    now: Seconds,
    vehicle: &Vehicle,
    requests: &HashMap<RequestId, &Request>,
    rv: &RvGraph,
    config: &MatchingConfig,
) -> VehicleTrips {
    let started = Instant::now();
    let start = StartState::of_vehicle(vehicle, now);
    let onboard = vehicle.committed_dropoffs();

    let mut trips = VehicleTrips {
        vehicle: vehicle.id,
        levels: vec![BTreeMap::new()],
        stats: vec![LevelStats::default()],
        timed_out: false,
    };
    trips.levels[0].insert(Vec::new(), baseline_visit(oracle, now, vehicle, &start, &onboard));

    let max_size = config
        .max_trip_size
        .unwrap_or(usize::MAX)
        .min(vehicle.capacity as usize);
    if max_size == 0 {
        return trips;
    }

    let mut singles = BTreeMap::new();
    let mut stats = LevelStats::default();
    for id in rv.requests_for(vehicle.id) {
        let Some(request) = requests.get(id) else {
            continue;
        };
        stats.candidates += 1;
        if let Some(visit) = best_insertion(oracle, &start, vehicle.id, &onboard, request) {
            stats.feasible += 1;
            singles.insert(vec![*id], visit);
        }
    }
    let single_ids: Vec<RequestId> = singles.keys().map(|key| key[0]).collect();
    trips.levels.push(singles);
    trips.stats.push(stats);

    for size in 2..=max_size {
        if started.elapsed() >= config.rtv_timeout() {
            trips.timed_out = true;
            debug!(vehicle = %vehicle.id, level = size, "trip search budget exhausted");
            break;
        }
        let previous = &trips.levels[size - 1];
        if previous.is_empty() {
            break;
        }

        let mut stats = LevelStats::default();
        let mut level = BTreeMap::new();
        for trip in previous.keys() {
            let Some(&highest) = trip.last() else {
                continue;
            };
            for &candidate in single_ids.iter().filter(|id| **id > highest) {
                if size == 2 && !rv.shares_trip(highest, candidate) {
                    continue;
                }
                stats.candidates += 1;
                let mut members = trip.clone();
                members.push(candidate);
                if size > 2 && !sub_trips_feasible(&members, previous) {
                    stats.pruned += 1;
                    continue;
                }
                let Some(riders) = members
                    .iter()
                    .map(|id| requests.get(id).copied())
                    .collect::<Option<Vec<&Request>>>()
                else {
                    continue;
                };
                if let Some(visit) = best_sequence(oracle, &start, vehicle.id, &riders, &onboard) {
                    stats.feasible += 1;
                    level.insert(members, visit);
                }
            }
        }
        trips.levels.push(level);
        trips.stats.push(stats);
    }
    trips
}

/// Every trip obtained by removing one member from `members` is in `below`.
fn sub_trips_feasible(members: &[RequestId], below: &BTreeMap<Vec<RequestId>, Visit>) -> bool {
    (0..members.len()).all(|skip| {
        let sub: Vec<RequestId> = members
            .iter()
            .enumerate()
            .filter_map(|(index, id)| (index != skip).then_some(*id))
            .collect();
        below.contains_key(&sub)
    })
}

/// The visit a vehicle falls back to when it serves no new request.
///
/// With passengers on board this delivers them, in relaxed mode if no on-time
/// order remains. Otherwise the vehicle relocates to its en-route waypoint or
/// stays put.
pub fn baseline_visit(
    oracle: &dyn DistanceOracle,
    now: Seconds,
    vehicle: &Vehicle,
    start: &StartState,
    onboard: &[Stop],
) -> Visit {
    if !onboard.is_empty() {
        if let Some(visit) = best_sequence(oracle, start, vehicle.id, &[], onboard) {
            return visit;
        }
        if let Some(visit) = forced_sequence(oracle, start, vehicle.id, onboard) {
            warn!(
                vehicle = %vehicle.id,
                delay = visit.delay,
                "passengers can no longer be delivered on time, forcing late route"
            );
            return visit;
        }
        warn!(vehicle = %vehicle.id, "no route delivers boarded passengers");
    }
    idle_visit(oracle, now, vehicle)
}

/// Relocation to the en-route waypoint, or a stay in place.
pub fn idle_visit(oracle: &dyn DistanceOracle, now: Seconds, vehicle: &Vehicle) -> Visit {
    match vehicle.en_route {
        Some(route) => {
            let arrival = oracle
                .travel_secs(vehicle.position, route.waypoint)
                .map_or(vehicle.departure, |secs| vehicle.departure.saturating_add(secs))
                .max(now);
            Visit::relocation(vehicle.id, route.waypoint, arrival)
        }
        None => Visit::stay(vehicle.id),
    }
}

/// All candidate visits of one round, stored in a single arena.
#[derive(Debug, Clone, Default)]
pub struct RtvGraph {
    visits: Vec<Visit>,
    by_vehicle: BTreeMap<VehicleId, Vec<VisitId>>,
    by_request: BTreeMap<RequestId, Vec<VisitId>>,
    vehicle_counts: BTreeMap<RequestId, usize>,
    level_stats: BTreeMap<usize, LevelStats>,
    timed_out: Vec<VehicleId>,
}

impl RtvGraph {
    /// Run the trip search for every vehicle and merge the results.
    pub fn build(
        oracle: &dyn DistanceOracle,
        now: Seconds,
        requests: &[Request],
        vehicles: &[Vehicle],
        rv: &RvGraph,
        config: &MatchingConfig,
    ) -> Self {
        let lookup: HashMap<RequestId, &Request> =
            requests.iter().map(|request| (request.id, request)).collect();
        let search = |vehicle: &Vehicle| enumerate_trips(oracle, now, vehicle, &lookup, rv, config);
        let per_vehicle: Vec<VehicleTrips> = if config.parallel {
            vehicles.par_iter().map(search).collect()
        } else {
            vehicles.iter().map(search).collect()
        };
        let graph = Self::from_trips(per_vehicle);
        debug!(
            visits = graph.visit_count(),
            timed_out = graph.timed_out.len(),
            "built RTV graph"
        );
        graph
    }

    /// Merge per-vehicle searches into the arena, in roster order.
    pub fn from_trips(per_vehicle: Vec<VehicleTrips>) -> Self {
        let mut graph = Self::default();
        for trips in per_vehicle {
            if trips.timed_out {
                graph.timed_out.push(trips.vehicle);
            }
            for (level, stats) in trips.stats.iter().enumerate() {
                graph.level_stats.entry(level).or_default().merge(stats);
            }
            let mut served: HashSet<RequestId> = HashSet::new();
            let mut ids = Vec::with_capacity(trips.trip_count());
            for visit in trips.levels.into_iter().flat_map(BTreeMap::into_values) {
                let id = VisitId(graph.visits.len() as u32);
                for request in &visit.requests {
                    graph.by_request.entry(*request).or_default().push(id);
                    served.insert(*request);
                }
                ids.push(id);
                graph.visits.push(visit);
            }
            for request in served {
                *graph.vehicle_counts.entry(request).or_default() += 1;
            }
            graph.by_vehicle.insert(trips.vehicle, ids);
        }
        graph
    }

    pub fn visit(&self, id: VisitId) -> &Visit {
        &self.visits[id.index()]
    }

    pub fn get(&self, id: VisitId) -> Option<&Visit> {
        self.visits.get(id.index())
    }

    pub fn visits(&self) -> impl Iterator<Item = (VisitId, &Visit)> {
        self.visits
            .iter()
            .enumerate()
            .map(|(index, visit)| (VisitId(index as u32), visit))
    }

    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }

    /// Candidate visits of `vehicle`; the first one is its baseline visit.
    pub fn visits_of(&self, vehicle: VehicleId) -> &[VisitId] {
        self.by_vehicle.get(&vehicle).map_or(&[], Vec::as_slice)
    }

    /// Candidate visits picking up `request`.
    pub fn visits_serving(&self, request: RequestId) -> &[VisitId] {
        self.by_request.get(&request).map_or(&[], Vec::as_slice)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.by_vehicle.keys().copied()
    }

    /// Number of vehicles with at least one visit picking up `request`.
    pub fn vehicle_count(&self, request: RequestId) -> usize {
        self.vehicle_counts.get(&request).copied().unwrap_or(0)
    }

    pub fn vehicle_counts(&self) -> &BTreeMap<RequestId, usize> {
        &self.vehicle_counts
    }

    pub fn level_stats(&self) -> &BTreeMap<usize, LevelStats> {
        &self.level_stats
    }

    pub fn timed_out(&self) -> &[VehicleId] {
        &self.timed_out
    }

    /// Trip count per level across all vehicles.
    pub fn trips_per_level(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for visit in &self.visits {
            *counts.entry(visit.level()).or_default() += 1;
        }
        counts
    }
}
