use serde::{Deserialize, Serialize};

use super::ids::{NodeId, RequestId, Seconds, VehicleId};
use super::stop::{RequestStop, Stop, TimeWindow};

/// Quality-of-service class: how much delay a customer segment tolerates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosClass {
    pub name: String,
    /// Maximum wait after the request time before pickup.
    pub pickup_delay: Seconds,
    /// Maximum lateness at drop-off compared with a direct ride.
    pub dropoff_delay: Seconds,
    pub sharing_allowed: bool,
}

impl QosClass {
    pub fn new(name: impl Into<String>, pickup_delay: Seconds, dropoff_delay: Seconds) -> Self {
        Self {
            name: name.into(),
            pickup_delay,
            dropoff_delay,
            sharing_allowed: true,
        }
    }

    pub fn with_sharing(mut self, sharing_allowed: bool) -> Self {
        self.sharing_allowed = sharing_allowed;
        self
    }
}

impl Default for QosClass {
    fn default() -> Self {
        Self::new("standard", 180, 600)
    }
}

/// A transport request moving `seats` passengers from `origin` to `destination`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub seats: u32,
    pub origin: NodeId,
    pub destination: NodeId,
    pub requested_at: Seconds,
    pub pickup_window: TimeWindow,
    pub dropoff_window: TimeWindow,
    pub sharing_allowed: bool,
    pub qos: String,
    /// Oracle travel time from origin to destination, when known.
    pub direct_travel: Option<Seconds>,
    /// Committed request: may be re-routed to another vehicle but never rejected.
    pub previously_assigned: bool,
    /// Vehicle whose current visit serves this request, if any.
    pub assigned_vehicle: Option<VehicleId>,
}

impl Request {
    /// Build a request whose windows follow its QoS class.
    ///
    /// `direct_travel` is the oracle travel time from origin to destination;
    /// the drop-off window opens when a direct ride would arrive.
    pub fn from_qos(
        id: RequestId,
        origin: NodeId,
        destination: NodeId,
        requested_at: Seconds,
        seats: u32,
        direct_travel: Seconds,
        qos: &QosClass,
    ) -> Self {
        let dropoff_earliest = requested_at.saturating_add(direct_travel);
        Self {
            id,
            seats,
            origin,
            destination,
            requested_at,
            pickup_window: TimeWindow::new(
                requested_at,
                requested_at.saturating_add(qos.pickup_delay),
            ),
            dropoff_window: TimeWindow::new(
                dropoff_earliest,
                dropoff_earliest.saturating_add(qos.dropoff_delay),
            ),
            sharing_allowed: qos.sharing_allowed,
            qos: qos.name.clone(),
            direct_travel: Some(direct_travel),
            previously_assigned: false,
            assigned_vehicle: None,
        }
    }

    /// Request with explicit windows, mostly for fixtures and external feeds.
    pub fn with_windows(
        id: RequestId,
        origin: NodeId,
        destination: NodeId,
        pickup_window: TimeWindow,
        dropoff_window: TimeWindow,
    ) -> Self {
        Self {
            id,
            seats: 1,
            origin,
            destination,
            requested_at: pickup_window.earliest,
            pickup_window,
            dropoff_window,
            sharing_allowed: true,
            qos: QosClass::default().name,
            direct_travel: None,
            previously_assigned: false,
            assigned_vehicle: None,
        }
    }

    pub fn seats(mut self, seats: u32) -> Self {
        self.seats = seats;
        self
    }

    pub fn sharing(mut self, allowed: bool) -> Self {
        self.sharing_allowed = allowed;
        self
    }

    pub fn direct_travel(mut self, secs: Seconds) -> Self {
        self.direct_travel = Some(secs);
        self
    }

    pub fn assigned_to(mut self, vehicle: VehicleId, committed: bool) -> Self {
        self.assigned_vehicle = Some(vehicle);
        self.previously_assigned = committed;
        self
    }

    fn stop(&self, node: NodeId, window: TimeWindow, ideal: Seconds) -> RequestStop {
        RequestStop {
            request: self.id,
            node,
            window,
            seats: self.seats,
            shareable: self.sharing_allowed,
            ideal,
        }
    }

    pub fn pickup(&self) -> Stop {
        Stop::Pickup(self.stop(self.origin, self.pickup_window, self.pickup_window.earliest))
    }

    /// Drop-off stop; lateness counts from the later of the window opening
    /// and an immediate direct ride.
    pub fn dropoff(&self) -> Stop {
        let direct_arrival = self
            .pickup_window
            .earliest
            .saturating_add(self.direct_travel.unwrap_or(0));
        let ideal = self.dropoff_window.earliest.max(direct_arrival);
        Stop::Dropoff(self.stop(self.destination, self.dropoff_window, ideal))
    }

    /// True if the windows and seat count describe a servable request.
    pub fn is_well_formed(&self) -> bool {
        self.seats > 0 && self.pickup_window.is_valid() && self.dropoff_window.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_follow_qos_class() {
        let qos = QosClass::new("premium", 120, 300).with_sharing(false);
        let request = Request::from_qos(RequestId(1), NodeId(0), NodeId(5), 1000, 2, 400, &qos);

        assert_eq!(request.pickup_window, TimeWindow::new(1000, 1120));
        assert_eq!(request.dropoff_window, TimeWindow::new(1400, 1700));
        assert!(!request.sharing_allowed);
        assert_eq!(request.qos, "premium");
        assert_eq!(request.direct_travel, Some(400));
        assert!(request.is_well_formed());
    }

    #[test]
    fn stops_carry_owner_and_load() {
        let request = Request::with_windows(
            RequestId(3),
            NodeId(1),
            NodeId(2),
            TimeWindow::new(0, 100),
            TimeWindow::new(0, 200),
        )
        .seats(2)
        .sharing(false);

        let pickup = request.pickup();
        assert_eq!(pickup.request(), Some(RequestId(3)));
        assert_eq!(pickup.load_delta(), 2);
        assert_eq!(request.dropoff().node(), NodeId(2));
        match request.clone().direct_travel(50).dropoff() {
            Stop::Dropoff(stop) => assert_eq!(stop.ideal, 50),
            other => panic!("unexpected stop {other:?}"),
        }
        match pickup {
            Stop::Pickup(stop) => assert!(!stop.shareable),
            other => panic!("unexpected stop {other:?}"),
        }
    }
}
