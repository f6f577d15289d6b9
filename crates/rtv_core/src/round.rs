//! One decision round: validate inputs, build the RV and RTV graphs, run the
//! assignment strategy, check the result.
//!
//! [`run_round`] never mutates its inputs. [`apply_round`] is the only place
//! where request back-references and vehicle visits change, and it is meant
//! to be called at the round boundary by whoever owns the fleet state.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::config::MatchingConfig;
use crate::graph::{RtvGraph, RtvSnapshot, RvGraph};
use crate::matching::result::baseline_of;
use crate::matching::{
    strategy_for, Assignment, AssignmentInput, AssignmentOutcome, AssignmentStrategy, Resolution,
};
use crate::model::{Request, RequestId, Seconds, Stop, Vehicle, VehicleId, Visit, VisitKind};
use crate::oracle::DistanceOracle;
use crate::profiling::PhaseDurations;

/// Everything a round needs besides the fleet state.
pub struct RoundContext {
    pub config: MatchingConfig,
    pub oracle: Arc<dyn DistanceOracle>,
    pub strategy: Box<dyn AssignmentStrategy>,
    /// Attach an [`RtvSnapshot`] to every result.
    pub capture_snapshot: bool,
}

impl RoundContext {
    pub fn new(config: MatchingConfig, oracle: Arc<dyn DistanceOracle>) -> Self {
        let strategy = strategy_for(&config);
        Self {
            config,
            oracle,
            strategy,
            capture_snapshot: false,
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn AssignmentStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_snapshots(mut self, capture: bool) -> Self {
        self.capture_snapshot = capture;
        self
    }
}

/// Size of the graphs built during a round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundStats {
    pub requests: usize,
    pub vehicles: usize,
    pub rv_edges: usize,
    pub rr_edges: usize,
    pub visits: usize,
    pub trips_per_level: BTreeMap<usize, usize>,
    pub timed_out_vehicles: usize,
}

/// Output of [`run_round`], handed back to the driver.
#[derive(Debug, Clone)]
pub struct RoundResult {
    pub now: Seconds,
    pub assignment: Assignment,
    pub resolution: Resolution,
    /// Requests left out of the round because their data was unusable.
    pub excluded_requests: Vec<RequestId>,
    pub excluded_vehicles: Vec<VehicleId>,
    /// Chosen visits that broke a route invariant and were replaced.
    pub violations: Vec<String>,
    pub stats: RoundStats,
    pub durations: PhaseDurations,
    pub snapshot: Option<RtvSnapshot>,
}

impl RoundResult {
    pub fn outcome(&self) -> AssignmentOutcome {
        self.assignment.outcome
    }

    pub fn visit_of(&self, vehicle: VehicleId) -> Option<&Visit> {
        self.assignment.visit_of(vehicle)
    }
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

struct Validated {
    requests: Vec<Request>,
    vehicles: Vec<Vehicle>,
    excluded_requests: Vec<RequestId>,
    excluded_vehicles: Vec<VehicleId>,
}

fn validate(oracle: &dyn DistanceOracle, requests: &[Request], vehicles: &[Vehicle]) -> Validated {
    let mut excluded_vehicles = Vec::new();
    let mut roster: HashSet<VehicleId> = HashSet::new();
    let mut aboard: HashSet<RequestId> = HashSet::new();
    let mut kept_vehicles = Vec::with_capacity(vehicles.len());
    for vehicle in vehicles {
        if !vehicle.is_well_formed() {
            warn!(vehicle = %vehicle.id, load = vehicle.load(), capacity = vehicle.capacity, "malformed vehicle excluded from round");
            excluded_vehicles.push(vehicle.id);
            continue;
        }
        if !roster.insert(vehicle.id) {
            warn!(vehicle = %vehicle.id, "duplicate vehicle id excluded from round");
            excluded_vehicles.push(vehicle.id);
            continue;
        }
        aboard.extend(vehicle.passenger_ids());
        kept_vehicles.push(vehicle.clone());
    }

    let mut excluded_requests = Vec::new();
    let mut seen: HashSet<RequestId> = HashSet::new();
    let mut kept_requests = Vec::with_capacity(requests.len());
    for request in requests {
        if !request.is_well_formed() {
            warn!(request = %request.id, "malformed request excluded from round");
            excluded_requests.push(request.id);
            continue;
        }
        if aboard.contains(&request.id) {
            warn!(request = %request.id, "request already on board excluded from round");
            excluded_requests.push(request.id);
            continue;
        }
        if !seen.insert(request.id) {
            warn!(request = %request.id, "duplicate request id excluded from round");
            excluded_requests.push(request.id);
            continue;
        }
        let mut request = request.clone();
        if request.direct_travel.is_none() {
            match oracle.travel_secs(request.origin, request.destination) {
                Some(direct) => request.direct_travel = Some(direct),
                None => {
                    warn!(request = %request.id, "no path from origin to destination, request excluded");
                    excluded_requests.push(request.id);
                    continue;
                }
            }
        }
        if let Some(vehicle) = request.assigned_vehicle {
            if !roster.contains(&vehicle) {
                warn!(request = %request.id, vehicle = %vehicle, "assigned vehicle not in roster, dropping back-reference");
                request.assigned_vehicle = None;
            }
        }
        kept_requests.push(request);
    }

    Validated {
        requests: kept_requests,
        vehicles: kept_vehicles,
        excluded_requests,
        excluded_vehicles,
    }
}

// ---------------------------------------------------------------------------
// Result checks
// ---------------------------------------------------------------------------

/// Route invariants of one chosen visit: stop precedence, load bounds, time
/// windows (skipped for forced visits), the ride-share rule between
/// consecutive stops and boarded passengers kept on board.
pub fn check_visit(visit: &Visit, vehicle: &Vehicle) -> Result<(), String> {
    if visit.arrivals.len() != visit.stops.len() {
        return Err(format!(
            "{}: {} arrivals for {} stops",
            vehicle.id,
            visit.arrivals.len(),
            visit.stops.len()
        ));
    }
    if let Some(pair) = visit.stops.windows(2).find(|pair| !pair[0].may_precede(&pair[1])) {
        return Err(format!(
            "{}: {:?} directly follows a private pickup of {:?}",
            vehicle.id,
            pair[1].request(),
            pair[0].request()
        ));
    }

    let onboard = vehicle.passenger_ids();
    let mut load = i64::from(vehicle.load());
    let mut picked: HashSet<RequestId> = HashSet::new();
    let mut dropped: HashSet<RequestId> = HashSet::new();
    for (stop, arrival) in visit.stops.iter().zip(&visit.arrivals) {
        load += stop.load_delta();
        if load < 0 || load > i64::from(vehicle.capacity) {
            return Err(format!("{}: load {load} out of bounds", vehicle.id));
        }
        if !visit.forced && stop.request().is_some() {
            let window = stop.window();
            if *arrival > window.latest || *arrival < window.earliest {
                return Err(format!(
                    "{}: arrival {arrival} outside window [{}, {}]",
                    vehicle.id, window.earliest, window.latest
                ));
            }
        }
        match stop {
            Stop::Pickup(owner) => {
                picked.insert(owner.request);
            }
            Stop::Dropoff(owner) => {
                let boarded = onboard.binary_search(&owner.request).is_ok();
                if !boarded && !picked.contains(&owner.request) {
                    return Err(format!("{}: {} dropped before pickup", vehicle.id, owner.request));
                }
                dropped.insert(owner.request);
            }
            Stop::Waypoint { .. } | Stop::Relocation { .. } => {}
        }
    }
    if let Some(missing) = onboard.iter().find(|id| !dropped.contains(id)) {
        return Err(format!("{}: boarded passenger {missing} left out", vehicle.id));
    }
    if let Some(open) = picked.iter().find(|id| !dropped.contains(id)) {
        return Err(format!("{}: {open} picked up but never dropped off", vehicle.id));
    }
    Ok(())
}

fn check_resolution(resolution: &Resolution, vehicles: &[Vehicle]) -> Vec<String> {
    let mut problems = Vec::new();
    for request in resolution.rejected.intersection(&resolution.displaced) {
        problems.push(format!("{request} both rejected and displaced"));
    }
    for request in resolution.serviced.keys() {
        if resolution.rejected.contains(request) || resolution.displaced.contains(request) {
            problems.push(format!("{request} serviced and unserved at once"));
        }
    }
    for vehicle in vehicles {
        if resolution.disrupted.contains(&vehicle.id) && vehicle.has_passengers() {
            problems.push(format!("{} disrupted while carrying passengers", vehicle.id));
        }
    }
    problems
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// Run one decision round at time `now`.
///
/// Malformed requests and vehicles are excluded and reported rather than
/// failing the round. The result always holds one visit per kept vehicle.
pub fn run_round(
    ctx: &RoundContext,
    now: Seconds,
    requests: &[Request],
    vehicles: &[Vehicle],
) -> RoundResult {
    let _round = info_span!("round", now, strategy = ctx.strategy.name()).entered();
    let started = Instant::now();
    let mut durations = PhaseDurations::default();
    let oracle = ctx.oracle.as_ref();

    let phase = Instant::now();
    let validated = validate(oracle, requests, vehicles);
    durations.validation = phase.elapsed();

    let phase = Instant::now();
    let rv = info_span!("rv").in_scope(|| {
        RvGraph::build(oracle, now, &validated.requests, &validated.vehicles, &ctx.config)
    });
    durations.rv = phase.elapsed();

    let phase = Instant::now();
    let rtv = info_span!("rtv").in_scope(|| {
        RtvGraph::build(oracle, now, &validated.requests, &validated.vehicles, &rv, &ctx.config)
    });
    durations.rtv = phase.elapsed();

    let phase = Instant::now();
    let input = AssignmentInput::new(&rtv, &validated.requests, &validated.vehicles);
    let mut assignment = info_span!("assignment").in_scope(|| ctx.strategy.assign(&input));
    durations.assignment = phase.elapsed();

    let mut violations = Vec::new();
    for vehicle in &validated.vehicles {
        let Some(visit) = assignment.visit_of(vehicle.id) else {
            violations.push(format!("{} has no visit", vehicle.id));
            assignment.choose(baseline_of(&input, vehicle.id));
            continue;
        };
        if let Err(problem) = check_visit(visit, vehicle) {
            error!(%problem, "chosen visit breaks a route invariant, vehicle falls back to its baseline");
            violations.push(problem);
            assignment.choose(baseline_of(&input, vehicle.id));
        }
    }
    let resolution = assignment.resolve(&input);
    for problem in check_resolution(&resolution, &validated.vehicles) {
        error!(%problem, "round result invariant broken");
        violations.push(problem);
    }

    let stats = RoundStats {
        requests: validated.requests.len(),
        vehicles: validated.vehicles.len(),
        rv_edges: rv.rv_edge_count(),
        rr_edges: rv.rr_edge_count(),
        visits: rtv.visit_count(),
        trips_per_level: rtv.trips_per_level(),
        timed_out_vehicles: rtv.timed_out().len(),
    };
    let snapshot = ctx
        .capture_snapshot
        .then(|| RtvSnapshot::capture(now, &rv, &rtv));
    durations.total = started.elapsed();

    info!(
        outcome = ?assignment.outcome,
        serviced = resolution.serviced.len(),
        rejected = resolution.rejected.len(),
        displaced = resolution.displaced.len(),
        disrupted = resolution.disrupted.len(),
        visits = stats.visits,
        total_ms = durations.total.as_millis() as u64,
        "round finished"
    );
    if !assignment.conflict.is_empty() {
        warn!(conflict = ?assignment.conflict, "round kept the previous plan");
    }

    RoundResult {
        now,
        assignment,
        resolution,
        excluded_requests: validated.excluded_requests,
        excluded_vehicles: validated.excluded_vehicles,
        violations,
        stats,
        durations,
        snapshot,
    }
}

/// Write a round's decisions back into the fleet state.
///
/// Serviced requests point at their new vehicle and become committed;
/// rejected and displaced requests lose their vehicle. Every vehicle in the
/// result realizes its chosen visit.
pub fn apply_round(result: &RoundResult, requests: &mut [Request], vehicles: &mut [Vehicle]) {
    let resolution = &result.resolution;
    for request in requests.iter_mut() {
        if let Some(vehicle) = resolution.serviced.get(&request.id) {
            request.assigned_vehicle = Some(*vehicle);
            request.previously_assigned = true;
        } else if resolution.rejected.contains(&request.id)
            || resolution.displaced.contains(&request.id)
        {
            request.assigned_vehicle = None;
        }
    }

    let served: BTreeSet<RequestId> = resolution.serviced.keys().copied().collect();
    for vehicle in vehicles.iter_mut() {
        let Some(visit) = result.assignment.visit_of(vehicle.id) else {
            continue;
        };
        if let Some(hired) = vehicle.hired_for {
            if served.contains(&hired) && !visit.serves(hired) {
                debug!(vehicle = %vehicle.id, request = %hired, "hired request served elsewhere");
                vehicle.hired_for = None;
            }
        }
        vehicle.current_visit = (visit.kind != VisitKind::Stay).then(|| visit.clone());
    }
}
