//! Synthetic scenarios: a hexagonal H3 neighbourhood, a fleet placed on it and
//! requests released over a time window.
//!
//! [`generate_scenario`] produces plain values for callers that drive rounds
//! themselves; [`build_scenario`] spawns the same values into an ECS world
//! ready for [`crate::runner::round_schedule`].

use std::sync::Arc;

use bevy_ecs::prelude::World;
use h3o::CellIndex;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::clock::RoundClock;
use crate::config::MatchingConfig;
use crate::ecs::{
    FleetTelemetry, LastRoundResult, MatchingContextResource, RequestAgent, RoundSchedule,
    Unassigned, VehicleAgent,
};
use crate::error::ScenarioError;
use crate::model::{NodeId, QosClass, Request, RequestId, Vehicle, VehicleId};
use crate::oracle::{DistanceOracle, H3Oracle};
use crate::profiling::RoundTimings;
use crate::round::RoundContext;
use crate::runner::initialize_rounds;

/// Resolution 9 cell in the San Francisco Bay Area.
pub const DEFAULT_CENTER_CELL: u64 = 0x8a1fb46622dffff;

/// Share of generated requests belonging to one QoS class.
#[derive(Debug, Clone, PartialEq)]
pub struct QosShare {
    pub class: QosClass,
    pub weight: f64,
}

/// Parameters for generating a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub num_vehicles: usize,
    pub num_requests: usize,
    pub capacity: u32,
    /// Upper bound on seats per request (clamped to `capacity`).
    pub max_seats: u32,
    pub seed: Option<u64>,
    pub center_cell: u64,
    /// Grid disk radius around the center; every cell becomes a node.
    pub grid_radius: u32,
    pub speed_kmh: f64,
    /// Requests are released uniformly over `[0, request_window_secs)`.
    pub request_window_secs: u32,
    pub qos_mix: Vec<QosShare>,
    pub round_interval_secs: u32,
    /// No round starts after this time.
    pub end_secs: u32,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            num_vehicles: 20,
            num_requests: 200,
            capacity: 4,
            max_seats: 2,
            seed: None,
            center_cell: DEFAULT_CENTER_CELL,
            grid_radius: 6,
            speed_kmh: 30.0,
            request_window_secs: 1_800,
            qos_mix: vec![
                QosShare {
                    class: QosClass::default(),
                    weight: 0.8,
                },
                QosShare {
                    class: QosClass::new("premium", 120, 300).with_sharing(false),
                    weight: 0.2,
                },
            ],
            round_interval_secs: 30,
            end_secs: 3_600,
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_fleet(mut self, num_vehicles: usize, capacity: u32) -> Self {
        self.num_vehicles = num_vehicles;
        self.capacity = capacity;
        self
    }

    pub fn with_requests(mut self, num_requests: usize, window_secs: u32) -> Self {
        self.num_requests = num_requests;
        self.request_window_secs = window_secs;
        self
    }

    pub fn with_grid_radius(mut self, radius: u32) -> Self {
        self.grid_radius = radius;
        self
    }

    pub fn with_qos_mix(mut self, qos_mix: Vec<QosShare>) -> Self {
        self.qos_mix = qos_mix;
        self
    }

    pub fn with_rounds(mut self, interval_secs: u32, end_secs: u32) -> Self {
        self.round_interval_secs = interval_secs;
        self.end_secs = end_secs;
        self
    }
}

/// Generated fleet state plus the oracle its node ids refer to.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub oracle: H3Oracle,
    pub requests: Vec<Request>,
    pub vehicles: Vec<Vehicle>,
}

fn scenario_cells(params: &ScenarioParams) -> Result<Vec<CellIndex>, ScenarioError> {
    let center = CellIndex::try_from(params.center_cell)
        .map_err(|_| ScenarioError::InvalidCenter(params.center_cell))?;
    let mut cells: Vec<CellIndex> = center.grid_disk::<Vec<_>>(params.grid_radius);
    cells.sort_unstable();
    if cells.len() < 2 {
        return Err(ScenarioError::TooFewNodes(params.grid_radius));
    }
    Ok(cells)
}

/// Generate requests and vehicles on an H3 neighbourhood.
///
/// Request ids follow release order. With a fixed seed the output is
/// reproducible.
pub fn generate_scenario(params: &ScenarioParams) -> Result<Scenario, ScenarioError> {
    if params.capacity == 0 {
        return Err(ScenarioError::Invalid("vehicle capacity must be positive".into()));
    }
    let cells = scenario_cells(params)?;
    let node_count = u32::try_from(cells.len())
        .map_err(|_| ScenarioError::Invalid("grid has too many cells".into()))?;
    let oracle = H3Oracle::new(cells, params.speed_kmh);

    let classes: Vec<QosClass> = if params.qos_mix.is_empty() {
        vec![QosClass::default()]
    } else {
        params.qos_mix.iter().map(|share| share.class.clone()).collect()
    };
    let weights: Vec<f64> = if params.qos_mix.is_empty() {
        vec![1.0]
    } else {
        params.qos_mix.iter().map(|share| share.weight).collect()
    };
    let qos_dist = WeightedIndex::new(&weights)
        .map_err(|err| ScenarioError::Invalid(format!("qos mix: {err}")))?;

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut release_times: Vec<u32> = (0..params.num_requests)
        .map(|_| {
            if params.request_window_secs == 0 {
                0
            } else {
                rng.gen_range(0..params.request_window_secs)
            }
        })
        .collect();
    release_times.sort_unstable();

    let max_seats = params.max_seats.clamp(1, params.capacity);
    let mut requests = Vec::with_capacity(params.num_requests);
    for (index, requested_at) in release_times.into_iter().enumerate() {
        let origin = rng.gen_range(0..node_count);
        let mut destination = rng.gen_range(0..node_count - 1);
        if destination >= origin {
            destination += 1;
        }
        let (origin, destination) = (NodeId(origin), NodeId(destination));
        let seats = rng.gen_range(1..=max_seats);
        let class = &classes[qos_dist.sample(&mut rng)];
        let direct_travel = oracle.travel_secs(origin, destination).unwrap_or(0);
        let id = RequestId(u32::try_from(index).map_err(|_| {
            ScenarioError::Invalid("request count exceeds id range".into())
        })?);
        requests.push(Request::from_qos(
            id,
            origin,
            destination,
            requested_at,
            seats,
            direct_travel,
            class,
        ));
    }

    let mut vehicles = Vec::with_capacity(params.num_vehicles);
    for index in 0..params.num_vehicles {
        let id = VehicleId(u32::try_from(index).map_err(|_| {
            ScenarioError::Invalid("vehicle count exceeds id range".into())
        })?);
        let position = NodeId(rng.gen_range(0..node_count));
        vehicles.push(Vehicle::new(id, params.capacity, position, 0));
    }

    Ok(Scenario {
        oracle,
        requests,
        vehicles,
    })
}

/// Insert the resources every round system expects.
pub fn insert_round_resources(world: &mut World, context: RoundContext, schedule: RoundSchedule) {
    world.insert_resource(RoundClock::default());
    world.insert_resource(MatchingContextResource::new(context));
    world.insert_resource(LastRoundResult::default());
    world.insert_resource(schedule);
    world.insert_resource(FleetTelemetry::default());
    world.insert_resource(RoundTimings::default());
}

/// Spawn one entity per request (marked [`Unassigned`]) and per vehicle.
pub fn spawn_fleet(world: &mut World, requests: Vec<Request>, vehicles: Vec<Vehicle>) {
    for request in requests {
        world.spawn((RequestAgent(request), Unassigned));
    }
    for vehicle in vehicles {
        world.spawn(VehicleAgent(vehicle));
    }
}

/// Generate a scenario and load it into `world`, with the first round queued at time 0.
pub fn build_scenario(
    world: &mut World,
    params: ScenarioParams,
    config: MatchingConfig,
) -> Result<(), ScenarioError> {
    config.validate()?;
    let scenario = generate_scenario(&params)?;
    info!(
        nodes = scenario.oracle.len(),
        requests = scenario.requests.len(),
        vehicles = scenario.vehicles.len(),
        assignment = ?config.assignment,
        "scenario built"
    );

    let context = RoundContext::new(config, Arc::new(scenario.oracle));
    insert_round_resources(
        world,
        context,
        RoundSchedule {
            interval_secs: params.round_interval_secs,
            end_secs: params.end_secs,
        },
    );
    spawn_fleet(world, scenario.requests, scenario.vehicles);
    initialize_rounds(world, 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_generation_is_reproducible() {
        let params = ScenarioParams::default()
            .with_seed(7)
            .with_fleet(5, 3)
            .with_requests(40, 600)
            .with_grid_radius(3);
        let first = generate_scenario(&params).expect("scenario");
        let second = generate_scenario(&params).expect("scenario");

        assert_eq!(first.requests, second.requests);
        assert_eq!(first.vehicles, second.vehicles);
        assert_eq!(first.requests.len(), 40);
        assert_eq!(first.vehicles.len(), 5);
        // Grid disk of radius 3 holds 37 cells.
        assert_eq!(first.oracle.len(), 37);
    }

    #[test]
    fn generated_requests_are_servable() {
        let params = ScenarioParams::default().with_seed(11).with_requests(60, 300);
        let scenario = generate_scenario(&params).expect("scenario");

        for pair in scenario.requests.windows(2) {
            assert!(pair[0].requested_at <= pair[1].requested_at);
        }
        for request in &scenario.requests {
            assert!(request.is_well_formed());
            assert_ne!(request.origin, request.destination);
            assert!(request.seats >= 1 && request.seats <= params.capacity);
            assert!(request.requested_at < 300);
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let params = ScenarioParams::default().with_fleet(3, 0);
        assert!(matches!(
            generate_scenario(&params),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn invalid_center_is_reported() {
        let params = ScenarioParams {
            center_cell: 0,
            ..ScenarioParams::default()
        };
        assert!(matches!(
            generate_scenario(&params),
            Err(ScenarioError::InvalidCenter(0))
        ));
    }
}
