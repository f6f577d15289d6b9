//! Fleet state as ECS entities.
//!
//! Each request and vehicle is an entity carrying its round snapshot
//! ([`RequestAgent`], [`VehicleAgent`]) plus one status marker. Systems copy
//! the snapshots out, run a round on plain values and write the decisions back
//! through [`RequestStateCommands`] and [`VehicleStateCommands`].

use std::ops::Deref;

use bevy_ecs::prelude::{Component, Resource};
use bevy_ecs::system::EntityCommands;

use crate::model::{Request, Vehicle};
use crate::round::{RoundContext, RoundResult};

#[derive(Debug, Clone, PartialEq, Component)]
pub struct RequestAgent(pub Request);

#[derive(Debug, Clone, PartialEq, Component)]
pub struct VehicleAgent(pub Vehicle);

// ---------------------------------------------------------------------------
// Request status markers
// ---------------------------------------------------------------------------

/// Released and waiting for a first assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Unassigned;

/// A vehicle's visit will pick the request up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Assigned;

/// Not covered in the last round; retried while its pickup window is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Rejected;

/// Lost its vehicle in the last round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Displaced;

/// Picked up, drop-off pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Boarded;

/// Dropped off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Completed;

/// Pickup window closed without a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Denied;

// ---------------------------------------------------------------------------
// Vehicle status markers
// ---------------------------------------------------------------------------

/// Lost a request in the last round and was sent to a safe point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct Disrupted;

pub trait RequestStateCommands {
    fn set_request_state_unassigned(&mut self) -> &mut Self;
    fn set_request_state_assigned(&mut self) -> &mut Self;
    fn set_request_state_rejected(&mut self) -> &mut Self;
    fn set_request_state_displaced(&mut self) -> &mut Self;
    fn set_request_state_boarded(&mut self) -> &mut Self;
    fn set_request_state_completed(&mut self) -> &mut Self;
    fn set_request_state_denied(&mut self) -> &mut Self;
}

type RequestMarkers = (
    Unassigned,
    Assigned,
    Rejected,
    Displaced,
    Boarded,
    Completed,
    Denied,
);

impl RequestStateCommands for EntityCommands<'_> {
    fn set_request_state_unassigned(&mut self) -> &mut Self {
        self.remove::<RequestMarkers>().insert(Unassigned)
    }

    fn set_request_state_assigned(&mut self) -> &mut Self {
        self.remove::<RequestMarkers>().insert(Assigned)
    }

    fn set_request_state_rejected(&mut self) -> &mut Self {
        self.remove::<RequestMarkers>().insert(Rejected)
    }

    fn set_request_state_displaced(&mut self) -> &mut Self {
        self.remove::<RequestMarkers>().insert(Displaced)
    }

    fn set_request_state_boarded(&mut self) -> &mut Self {
        self.remove::<RequestMarkers>().insert(Boarded)
    }

    fn set_request_state_completed(&mut self) -> &mut Self {
        self.remove::<RequestMarkers>().insert(Completed)
    }

    fn set_request_state_denied(&mut self) -> &mut Self {
        self.remove::<RequestMarkers>().insert(Denied)
    }
}

pub trait VehicleStateCommands {
    fn set_vehicle_disrupted(&mut self, disrupted: bool) -> &mut Self;
}

impl VehicleStateCommands for EntityCommands<'_> {
    fn set_vehicle_disrupted(&mut self, disrupted: bool) -> &mut Self {
        if disrupted {
            self.insert(Disrupted)
        } else {
            self.remove::<Disrupted>()
        }
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Resource wrapper for the round context (config, oracle, strategy).
#[derive(Resource)]
pub struct MatchingContextResource(pub RoundContext);

impl MatchingContextResource {
    pub fn new(context: RoundContext) -> Self {
        Self(context)
    }
}

impl Deref for MatchingContextResource {
    type Target = RoundContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Result of the most recent assignment round.
#[derive(Debug, Default, Resource)]
pub struct LastRoundResult(pub Option<RoundResult>);

/// Fixed spacing between assignment rounds and the end of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Resource)]
pub struct RoundSchedule {
    pub interval_secs: u32,
    pub end_secs: u32,
}

impl Default for RoundSchedule {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            end_secs: 3_600,
        }
    }
}

/// Counters over the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Resource)]
pub struct FleetTelemetry {
    pub rounds: u64,
    pub fallback_rounds: u64,
    pub assignments: u64,
    pub rejections: u64,
    pub displacements: u64,
    pub disruptions: u64,
    pub pickups: u64,
    pub dropoffs: u64,
    pub denied: u64,
    /// Sum of drop-off lateness over completed requests.
    pub total_delay: u64,
}
