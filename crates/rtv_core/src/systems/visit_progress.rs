//! Visit progress system: vehicles execute every stop of their current visit
//! whose planned arrival is not after the event time.
//!
//! Pickups move the drop-off onto the vehicle, drop-offs complete the request.
//! Executed stops are removed from the visit; a vehicle whose visit runs out
//! is left without one.

use std::collections::HashMap;

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentRound, RoundEventKind};
use crate::ecs::{FleetTelemetry, RequestAgent, RequestStateCommands, VehicleAgent};
use crate::model::{RequestId, Seconds, Stop, Vehicle, Visit};

/// What happened while a vehicle advanced along its visit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Progress {
    pub boarded: Vec<RequestId>,
    /// Completed requests with their drop-off lateness.
    pub completed: Vec<(RequestId, u64)>,
}

/// Execute the stops of `vehicle`'s current visit planned up to `now`.
pub fn advance_vehicle(vehicle: &mut Vehicle, now: Seconds) -> Progress {
    let mut progress = Progress::default();
    let Some(visit) = vehicle.current_visit.take() else {
        return progress;
    };
    let executed = visit.arrivals.iter().take_while(|arrival| **arrival <= now).count();

    for (stop, arrival) in visit.stops.iter().zip(&visit.arrivals).take(executed) {
        match stop {
            Stop::Pickup(owner) => {
                let dropoff = visit
                    .stops
                    .iter()
                    .find(|other| other.is_dropoff() && other.request() == Some(owner.request));
                match dropoff {
                    Some(dropoff) => vehicle.onboard.push(*dropoff),
                    None => warn!(vehicle = %vehicle.id, request = %owner.request, "visit picks up without a drop-off"),
                }
                if vehicle.hired_for == Some(owner.request) {
                    vehicle.hired_for = None;
                }
                progress.boarded.push(owner.request);
            }
            Stop::Dropoff(owner) => {
                if let Some(index) = vehicle
                    .onboard
                    .iter()
                    .position(|boarded| boarded.request() == Some(owner.request))
                {
                    vehicle.onboard.swap_remove(index);
                }
                progress
                    .completed
                    .push((owner.request, u64::from(arrival.saturating_sub(owner.ideal))));
            }
            Stop::Waypoint { .. } | Stop::Relocation { .. } => {}
        }
        vehicle.position = stop.node();
        vehicle.departure = *arrival;
    }
    if executed > 0 {
        vehicle.en_route = None;
    }

    vehicle.current_visit = remaining(visit, executed);
    progress
}

fn remaining(mut visit: Visit, executed: usize) -> Option<Visit> {
    if executed == 0 {
        return Some(visit);
    }
    visit.stops.drain(..executed);
    visit.arrivals.drain(..executed);
    if visit.stops.is_empty() {
        return None;
    }
    let pickups: Vec<RequestId> = visit
        .stops
        .iter()
        .filter(|stop| stop.is_pickup())
        .filter_map(Stop::request)
        .collect();
    visit.requests.retain(|id| pickups.contains(id));
    let mut passengers: Vec<RequestId> = visit
        .stops
        .iter()
        .filter(|stop| stop.is_dropoff())
        .filter_map(Stop::request)
        .filter(|id| !pickups.contains(id))
        .collect();
    passengers.sort_unstable();
    visit.passengers = passengers;
    Some(visit)
}

pub fn visit_progress_system(
    mut commands: Commands,
    event: Res<CurrentRound>,
    mut telemetry: Option<ResMut<FleetTelemetry>>,
    requests: Query<(Entity, &RequestAgent)>,
    mut vehicles: Query<&mut VehicleAgent>,
) {
    if event.0.kind != RoundEventKind::Progress {
        return;
    }
    let now = event.0.at;
    let by_id: HashMap<RequestId, Entity> = requests
        .iter()
        .map(|(entity, agent)| (agent.0.id, entity))
        .collect();

    for mut agent in vehicles.iter_mut() {
        let progress = advance_vehicle(&mut agent.0, now);
        for request in &progress.boarded {
            if let Some(&entity) = by_id.get(request) {
                commands.entity(entity).set_request_state_boarded();
            }
        }
        for (request, delay) in &progress.completed {
            if let Some(&entity) = by_id.get(request) {
                commands.entity(entity).set_request_state_completed();
            }
            if let Some(telemetry) = telemetry.as_deref_mut() {
                telemetry.total_delay += delay;
            }
        }
        if let Some(telemetry) = telemetry.as_deref_mut() {
            telemetry.pickups += progress.boarded.len() as u64;
            telemetry.dropoffs += progress.completed.len() as u64;
        }
        if !progress.boarded.is_empty() || !progress.completed.is_empty() {
            debug!(
                vehicle = %agent.0.id,
                boarded = progress.boarded.len(),
                completed = progress.completed.len(),
                "vehicle advanced"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeId, Request, TimeWindow, VehicleId, VisitKind};

    fn request(id: u32, from: u32, to: u32) -> Request {
        Request::with_windows(
            RequestId(id),
            NodeId(from),
            NodeId(to),
            TimeWindow::new(0, 100),
            TimeWindow::new(0, 300),
        )
        .direct_travel(from.abs_diff(to) * 10)
    }

    #[test]
    fn vehicle_executes_stops_up_to_now() {
        let first = request(1, 1, 3);
        let second = request(2, 2, 4);
        let mut visit = Visit::stay(VehicleId(1));
        visit.kind = VisitKind::Route;
        visit.stops = vec![first.pickup(), second.pickup(), first.dropoff(), second.dropoff()];
        visit.arrivals = vec![10, 20, 30, 40];
        visit.requests = vec![RequestId(1), RequestId(2)];
        let mut vehicle = Vehicle::new(VehicleId(1), 2, NodeId(0), 0);
        vehicle.current_visit = Some(visit);

        let progress = advance_vehicle(&mut vehicle, 30);

        assert_eq!(progress.boarded, vec![RequestId(1), RequestId(2)]);
        assert_eq!(progress.completed, vec![(RequestId(1), 10)]);
        assert_eq!(vehicle.position, NodeId(3));
        assert_eq!(vehicle.departure, 30);
        assert_eq!(vehicle.passenger_ids(), vec![RequestId(2)]);
        let rest = vehicle.current_visit.as_ref().expect("one stop left");
        assert_eq!(rest.stops, vec![second.dropoff()]);
        assert!(rest.requests.is_empty());
        assert_eq!(rest.passengers, vec![RequestId(2)]);

        let progress = advance_vehicle(&mut vehicle, 100);
        assert_eq!(progress.completed, vec![(RequestId(2), 20)]);
        assert!(vehicle.current_visit.is_none());
        assert!(!vehicle.has_passengers());
    }
}
