#![allow(dead_code)]

use std::sync::Arc;

use bevy_ecs::prelude::{Entity, With, World};
use rtv_core::config::MatchingConfig;
use rtv_core::ecs::{
    Assigned, Boarded, Completed, Denied, Displaced, Rejected, RequestAgent, RoundSchedule,
    Unassigned,
};
use rtv_core::model::{Request, RequestId, Vehicle};
use rtv_core::oracle::DistanceOracle;
use rtv_core::runner::initialize_rounds;
use rtv_core::scenario::spawn_fleet;
use rtv_core::test_helpers::{create_test_world, line_oracle, test_config};

/// Builder for worlds driven by the round schedule.
pub struct TestWorldBuilder {
    oracle: Arc<dyn DistanceOracle>,
    config: MatchingConfig,
    schedule: RoundSchedule,
    requests: Vec<Request>,
    vehicles: Vec<Vehicle>,
}

impl Default for TestWorldBuilder {
    fn default() -> Self {
        Self {
            oracle: Arc::new(line_oracle(10, 10)),
            config: test_config(),
            schedule: RoundSchedule {
                interval_secs: 30,
                end_secs: 600,
            },
            requests: Vec::new(),
            vehicles: Vec::new(),
        }
    }
}

impl TestWorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn DistanceOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_config(mut self, config: MatchingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rounds(mut self, interval_secs: u32, end_secs: u32) -> Self {
        self.schedule = RoundSchedule {
            interval_secs,
            end_secs,
        };
        self
    }

    pub fn with_request(mut self, request: Request) -> Self {
        self.requests.push(request);
        self
    }

    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicles.push(vehicle);
        self
    }

    /// World with entities spawned and the first round queued at time 0.
    pub fn build(self) -> World {
        let mut world = create_test_world(self.oracle, self.config);
        world.insert_resource(self.schedule);
        spawn_fleet(&mut world, self.requests, self.vehicles);
        initialize_rounds(&mut world, 0);
        world
    }
}

/// Request status as seen through its marker component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Unassigned,
    Assigned,
    Rejected,
    Displaced,
    Boarded,
    Completed,
    Denied,
}

pub fn request_entity(world: &mut World, id: RequestId) -> Option<Entity> {
    let mut query = world.query::<(Entity, &RequestAgent)>();
    query
        .iter(world)
        .find(|(_, agent)| agent.0.id == id)
        .map(|(entity, _)| entity)
}

/// Every marker currently on the request; a healthy entity carries exactly one.
pub fn request_statuses(world: &World, entity: Entity) -> Vec<RequestStatus> {
    let Some(entity) = world.get_entity(entity) else {
        return Vec::new();
    };
    let mut statuses = Vec::new();
    if entity.contains::<Unassigned>() {
        statuses.push(RequestStatus::Unassigned);
    }
    if entity.contains::<Assigned>() {
        statuses.push(RequestStatus::Assigned);
    }
    if entity.contains::<Rejected>() {
        statuses.push(RequestStatus::Rejected);
    }
    if entity.contains::<Displaced>() {
        statuses.push(RequestStatus::Displaced);
    }
    if entity.contains::<Boarded>() {
        statuses.push(RequestStatus::Boarded);
    }
    if entity.contains::<Completed>() {
        statuses.push(RequestStatus::Completed);
    }
    if entity.contains::<Denied>() {
        statuses.push(RequestStatus::Denied);
    }
    statuses
}

pub fn request_status(world: &mut World, id: RequestId) -> Option<RequestStatus> {
    let entity = request_entity(world, id)?;
    match request_statuses(world, entity).as_slice() {
        [status] => Some(*status),
        _ => None,
    }
}

pub fn count_with<T: bevy_ecs::component::Component>(world: &mut World) -> usize {
    let mut query = world.query_filtered::<Entity, (With<RequestAgent>, With<T>)>();
    query.iter(world).count()
}
