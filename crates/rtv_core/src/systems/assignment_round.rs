//! Assignment round system: snapshot the fleet, run one round, write the
//! decisions back onto the entities.
//!
//! Only released requests waiting for a vehicle (or re-routable ones already
//! holding a vehicle) enter the round. Requests still unassigned once their
//! pickup window has closed are denied instead.

use std::collections::HashMap;

use bevy_ecs::prelude::{Commands, Entity, Or, Query, Res, ResMut, With};
use tracing::debug;

use crate::clock::{CurrentRound, RoundEventKind};
use crate::ecs::{
    Assigned, Displaced, FleetTelemetry, LastRoundResult, MatchingContextResource, Rejected,
    RequestAgent, RequestStateCommands, Unassigned, VehicleAgent, VehicleStateCommands,
};
use crate::matching::AssignmentOutcome;
use crate::model::{Request, RequestId, Vehicle, VehicleId};
use crate::profiling::RoundTimings;
use crate::round::{apply_round, run_round};

type OpenRequest = Or<(With<Unassigned>, With<Assigned>, With<Rejected>, With<Displaced>)>;

#[allow(clippy::too_many_arguments)]
pub fn assignment_round_system(
    mut commands: Commands,
    event: Res<CurrentRound>,
    context: Res<MatchingContextResource>,
    mut last_round: ResMut<LastRoundResult>,
    timings: Option<ResMut<RoundTimings>>,
    mut telemetry: Option<ResMut<FleetTelemetry>>,
    mut requests: Query<(Entity, &mut RequestAgent), OpenRequest>,
    mut vehicles: Query<(Entity, &mut VehicleAgent)>,
) {
    if event.0.kind != RoundEventKind::Assignment {
        return;
    }
    let now = event.0.at;

    let mut round_requests: Vec<Request> = Vec::new();
    let mut request_entities: HashMap<RequestId, Entity> = HashMap::new();
    for (entity, agent) in requests.iter() {
        let request = &agent.0;
        if request.requested_at > now {
            continue;
        }
        if request.assigned_vehicle.is_none() && request.pickup_window.latest < now {
            debug!(request = %request.id, "pickup window closed without a vehicle");
            commands.entity(entity).set_request_state_denied();
            if let Some(telemetry) = telemetry.as_deref_mut() {
                telemetry.denied += 1;
            }
            continue;
        }
        request_entities.insert(request.id, entity);
        round_requests.push(request.clone());
    }

    let mut fleet: Vec<Vehicle> = Vec::new();
    let mut vehicle_entities: HashMap<VehicleId, Entity> = HashMap::new();
    for (entity, agent) in vehicles.iter() {
        vehicle_entities.insert(agent.0.id, entity);
        fleet.push(agent.0.clone());
    }

    let result = run_round(&context, now, &round_requests, &fleet);
    apply_round(&result, &mut round_requests, &mut fleet);

    let resolution = &result.resolution;
    for request in round_requests {
        let Some(&entity) = request_entities.get(&request.id) else {
            continue;
        };
        let id = request.id;
        if let Ok((_, mut agent)) = requests.get_mut(entity) {
            agent.0 = request;
        }
        let mut entity_commands = commands.entity(entity);
        if resolution.serviced.contains_key(&id) {
            entity_commands.set_request_state_assigned();
        } else if resolution.displaced.contains(&id) {
            entity_commands.set_request_state_displaced();
        } else if resolution.rejected.contains(&id) {
            entity_commands.set_request_state_rejected();
        }
    }

    for vehicle in fleet {
        let Some(&entity) = vehicle_entities.get(&vehicle.id) else {
            continue;
        };
        let disrupted = resolution.disrupted.contains(&vehicle.id);
        if let Ok((_, mut agent)) = vehicles.get_mut(entity) {
            agent.0 = vehicle;
        }
        commands.entity(entity).set_vehicle_disrupted(disrupted);
    }

    if let Some(mut timings) = timings {
        timings.record_round(&result.durations);
    }
    if let Some(telemetry) = telemetry.as_deref_mut() {
        telemetry.rounds += 1;
        if result.outcome() == AssignmentOutcome::Fallback {
            telemetry.fallback_rounds += 1;
        }
        telemetry.assignments += resolution.serviced.len() as u64;
        telemetry.rejections += resolution.rejected.len() as u64;
        telemetry.displacements += resolution.displaced.len() as u64;
        telemetry.disruptions += resolution.disrupted.len() as u64;
    }
    last_round.0 = Some(result);
}
