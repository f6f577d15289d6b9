use serde::{Deserialize, Serialize};

use super::ids::{NodeId, RequestId, Seconds, VehicleId};
use super::stop::Stop;
use super::visit::Visit;

/// Movement in progress between `position` and `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnRoute {
    /// Node the vehicle is currently heading to.
    pub target: NodeId,
    /// Closest network node the vehicle can divert from.
    pub waypoint: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub capacity: u32,
    /// Last visited node.
    pub position: NodeId,
    /// Time the vehicle leaves (or left) `position`.
    pub departure: Seconds,
    /// The vehicle must finish every stop by this time.
    pub contract_deadline: Seconds,
    pub en_route: Option<EnRoute>,
    /// Pending drop-offs of boarded passengers.
    pub onboard: Vec<Stop>,
    pub current_visit: Option<Visit>,
    /// Set when the vehicle was hired on demand for one request.
    pub hired_for: Option<RequestId>,
}

impl Vehicle {
    pub fn new(id: VehicleId, capacity: u32, position: NodeId, departure: Seconds) -> Self {
        Self {
            id,
            capacity,
            position,
            departure,
            contract_deadline: Seconds::MAX,
            en_route: None,
            onboard: Vec::new(),
            current_visit: None,
            hired_for: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Seconds) -> Self {
        self.contract_deadline = deadline;
        self
    }

    pub fn with_en_route(mut self, target: NodeId, waypoint: NodeId) -> Self {
        self.en_route = Some(EnRoute { target, waypoint });
        self
    }

    pub fn with_passenger(mut self, dropoff: Stop) -> Self {
        self.onboard.push(dropoff);
        self
    }

    pub fn hired_for(mut self, request: RequestId) -> Self {
        self.hired_for = Some(request);
        self
    }

    /// Seats currently occupied by boarded passengers.
    pub fn load(&self) -> u32 {
        self.onboard
            .iter()
            .map(|stop| u32::try_from(-stop.load_delta()).unwrap_or(0))
            .sum()
    }

    pub fn has_passengers(&self) -> bool {
        !self.onboard.is_empty()
    }

    pub fn passenger_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.onboard.iter().filter_map(Stop::request).collect();
        ids.sort_unstable();
        ids
    }

    /// Boarded drop-offs in the order of the current visit, if one exists.
    ///
    /// Drop-offs missing from the current visit keep their roster order at the end.
    pub fn committed_dropoffs(&self) -> Vec<Stop> {
        let Some(visit) = &self.current_visit else {
            return self.onboard.clone();
        };
        let mut ordered: Vec<Stop> = visit
            .stops
            .iter()
            .filter(|stop| stop.is_dropoff() && self.onboard.contains(stop))
            .copied()
            .collect();
        for stop in &self.onboard {
            if !ordered.contains(stop) {
                ordered.push(*stop);
            }
        }
        ordered
    }

    /// Check the roster entry is usable for a round.
    pub fn is_well_formed(&self) -> bool {
        self.capacity > 0
            && self.load() <= self.capacity
            && self.onboard.iter().all(Stop::is_dropoff)
    }
}
