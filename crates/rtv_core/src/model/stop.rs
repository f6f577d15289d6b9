use serde::{Deserialize, Serialize};

use super::ids::{NodeId, RequestId, Seconds};

/// Inclusive arrival window at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub earliest: Seconds,
    pub latest: Seconds,
}

impl TimeWindow {
    /// Window that accepts any arrival.
    pub const OPEN: TimeWindow = TimeWindow {
        earliest: 0,
        latest: Seconds::MAX,
    };

    pub fn new(earliest: Seconds, latest: Seconds) -> Self {
        Self { earliest, latest }
    }

    pub fn contains(&self, time: Seconds) -> bool {
        time >= self.earliest && time <= self.latest
    }

    pub fn is_valid(&self) -> bool {
        self.earliest <= self.latest
    }
}

/// Pickup or drop-off event owned by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStop {
    pub request: RequestId,
    pub node: NodeId,
    pub window: TimeWindow,
    pub seats: u32,
    /// Sharing consent of the owning request.
    pub shareable: bool,
    /// Arrival of an immediate direct ride; drop-off lateness is measured from here.
    pub ideal: Seconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StopKind {
    Pickup,
    Dropoff,
    Waypoint,
    Relocation,
}

/// A point a vehicle visits.
///
/// Pickups and drop-offs belong to a request and carry a time window and a
/// load delta. Waypoints (a vehicle's position while en route) and relocation
/// targets carry no window and no load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stop {
    Pickup(RequestStop),
    Dropoff(RequestStop),
    Waypoint { node: NodeId },
    Relocation { node: NodeId },
}

impl Stop {
    pub fn kind(&self) -> StopKind {
        match self {
            Stop::Pickup(_) => StopKind::Pickup,
            Stop::Dropoff(_) => StopKind::Dropoff,
            Stop::Waypoint { .. } => StopKind::Waypoint,
            Stop::Relocation { .. } => StopKind::Relocation,
        }
    }

    pub fn node(&self) -> NodeId {
        match self {
            Stop::Pickup(s) | Stop::Dropoff(s) => s.node,
            Stop::Waypoint { node } | Stop::Relocation { node } => *node,
        }
    }

    /// Seats gained (pickup) or released (drop-off) when the stop is served.
    pub fn load_delta(&self) -> i64 {
        match self {
            Stop::Pickup(s) => i64::from(s.seats),
            Stop::Dropoff(s) => -i64::from(s.seats),
            Stop::Waypoint { .. } | Stop::Relocation { .. } => 0,
        }
    }

    pub fn window(&self) -> TimeWindow {
        match self {
            Stop::Pickup(s) | Stop::Dropoff(s) => s.window,
            Stop::Waypoint { .. } | Stop::Relocation { .. } => TimeWindow::OPEN,
        }
    }

    pub fn request(&self) -> Option<RequestId> {
        match self {
            Stop::Pickup(s) | Stop::Dropoff(s) => Some(s.request),
            Stop::Waypoint { .. } | Stop::Relocation { .. } => None,
        }
    }

    pub fn is_pickup(&self) -> bool {
        matches!(self, Stop::Pickup(_))
    }

    pub fn is_dropoff(&self) -> bool {
        matches!(self, Stop::Dropoff(_))
    }

    /// Ride-share rule between consecutive stops: the pickup of a request
    /// that refuses sharing is followed only by a stop of that same request.
    pub fn may_precede(&self, next: &Stop) -> bool {
        match self {
            Stop::Pickup(owner) => owner.shareable || next.request() == Some(owner.request),
            Stop::Dropoff(_) | Stop::Waypoint { .. } | Stop::Relocation { .. } => true,
        }
    }
}
