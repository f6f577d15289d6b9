//! Trip feasibility evaluation.
//!
//! [`PathBuilder`] walks an ordered stop sequence one stop at a time,
//! simulating arrivals with the distance oracle and rejecting the sequence as
//! soon as a load, window, sharing or deadline rule breaks. The builder is
//! cheap to clone, so sequence searches extend a shared feasible prefix
//! instead of re-evaluating it.
//!
//! Infeasibility is an ordinary outcome here: every check returns `false` or
//! `None`, never an error.

use crate::model::{EnRoute, NodeId, RequestId, Seconds, Stop, Vehicle, VehicleId, Visit, VisitKind};
use crate::oracle::DistanceOracle;

/// Where and when a sequence starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartState {
    pub node: NodeId,
    /// Departure time from `node`.
    pub departure: Seconds,
    /// Round time: no arrival is earlier than this.
    pub now: Seconds,
    pub load: u32,
    pub capacity: u32,
    pub deadline: Seconds,
    /// Set when the vehicle already left `node`; a waypoint is visited first
    /// unless the sequence starts at the current target.
    pub detour: Option<EnRoute>,
}

impl StartState {
    pub fn of_vehicle(vehicle: &Vehicle, now: Seconds) -> Self {
        Self {
            node: vehicle.position,
            departure: vehicle.departure,
            now,
            load: vehicle.load(),
            capacity: vehicle.capacity,
            deadline: vehicle.contract_deadline,
            detour: vehicle.en_route,
        }
    }
}

/// Incremental evaluator for one stop sequence.
#[derive(Clone)]
pub struct PathBuilder<'o> {
    oracle: &'o dyn DistanceOracle,
    now: Seconds,
    capacity: u32,
    deadline: Seconds,
    relaxed: bool,
    detour: Option<EnRoute>,
    node: NodeId,
    arrival: Seconds,
    load: i64,
    delay: u64,
    idleness: u64,
    slack: u64,
    stops: Vec<Stop>,
    arrivals: Vec<Seconds>,
}

impl<'o> PathBuilder<'o> {
    pub fn new(oracle: &'o dyn DistanceOracle, start: &StartState) -> Self {
        Self {
            oracle,
            now: start.now,
            capacity: start.capacity,
            deadline: start.deadline,
            relaxed: false,
            detour: start.detour,
            node: start.node,
            arrival: start.departure,
            load: i64::from(start.load),
            delay: 0,
            idleness: 0,
            slack: 0,
            stops: Vec::new(),
            arrivals: Vec::new(),
        }
    }

    /// Vehicle-neutral builder already standing at `pickup`.
    ///
    /// Used for request-request compatibility: the sequence starts at the
    /// first pickup as early as the round and the window allow, with
    /// unlimited capacity and no contract deadline.
    pub fn from_pickup(oracle: &'o dyn DistanceOracle, pickup: Stop, now: Seconds) -> Option<Self> {
        let Stop::Pickup(owner) = pickup else {
            return None;
        };
        let arrival = now.max(owner.window.earliest);
        if arrival > owner.window.latest {
            return None;
        }
        Some(Self {
            oracle,
            now,
            capacity: u32::MAX,
            deadline: Seconds::MAX,
            relaxed: false,
            detour: None,
            node: owner.node,
            arrival,
            load: pickup.load_delta(),
            delay: 0,
            idleness: 0,
            slack: u64::from(owner.window.latest - arrival),
            stops: vec![pickup],
            arrivals: vec![arrival],
        })
    }

    /// Ignore time windows and the contract deadline; capacity still holds.
    pub fn relaxed(mut self) -> Self {
        self.relaxed = true;
        self
    }

    pub fn delay(&self) -> u64 {
        self.delay
    }

    pub fn idleness(&self) -> u64 {
        self.idleness
    }

    pub fn arrival(&self) -> Seconds {
        self.arrival
    }

    pub fn load(&self) -> i64 {
        self.load
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    /// Ranking key of the sequence so far, laid out like [`Visit::quality_key`].
    pub fn quality_key(&self) -> (u64, usize, u64) {
        (self.delay, self.stops.len(), self.idleness)
    }

    /// Append `stop`; returns `false` when the extended sequence is infeasible.
    ///
    /// After a `false` the builder must be discarded.
    pub fn push(&mut self, stop: Stop) -> bool {
        if let Some(detour) = self.detour.take() {
            if stop.node() != detour.target
                && !self.advance(Stop::Waypoint {
                    node: detour.waypoint,
                })
            {
                return false;
            }
        }
        self.advance(stop)
    }

    fn advance(&mut self, stop: Stop) -> bool {
        if !self.stops.last().map_or(true, |previous| previous.may_precede(&stop)) {
            return false;
        }
        let load = self.load + stop.load_delta();
        if load < 0 || load > i64::from(self.capacity) {
            return false;
        }

        let Some(travel) = self.oracle.travel_secs(self.node, stop.node()) else {
            return false;
        };
        let mut arrival = self.arrival.saturating_add(travel).max(self.now);
        let window = stop.window();
        if !self.relaxed && arrival > window.latest {
            return false;
        }
        if arrival < window.earliest {
            if stop.is_pickup() {
                self.idleness += u64::from(window.earliest - arrival);
            }
            arrival = window.earliest;
        }

        if !self.relaxed && arrival > self.deadline {
            return false;
        }

        match stop {
            Stop::Dropoff(owner) => {
                self.delay += u64::from(arrival.saturating_sub(owner.ideal));
                self.slack += u64::from(window.latest.saturating_sub(arrival));
            }
            Stop::Pickup(_) => {
                self.slack += u64::from(window.latest.saturating_sub(arrival));
            }
            Stop::Waypoint { .. } | Stop::Relocation { .. } => {}
        }
        self.node = stop.node();
        self.arrival = arrival;
        self.load = load;
        self.stops.push(stop);
        self.arrivals.push(arrival);
        true
    }

    /// Turn the evaluated sequence into a visit for `vehicle`.
    pub fn finish(self, vehicle: VehicleId) -> Visit {
        let mut requests: Vec<RequestId> = self
            .stops
            .iter()
            .filter(|stop| stop.is_pickup())
            .filter_map(Stop::request)
            .collect();
        requests.sort_unstable();
        let mut passengers: Vec<RequestId> = self
            .stops
            .iter()
            .filter(|stop| stop.is_dropoff())
            .filter_map(Stop::request)
            .filter(|id| requests.binary_search(id).is_err())
            .collect();
        passengers.sort_unstable();

        let kind = if self.stops.iter().any(|stop| stop.request().is_some()) {
            VisitKind::Route
        } else if self.stops.is_empty() {
            VisitKind::Stay
        } else {
            VisitKind::Relocation
        };

        Visit {
            vehicle,
            kind,
            stops: self.stops,
            arrivals: self.arrivals,
            requests,
            passengers,
            delay: self.delay,
            idleness: self.idleness,
            slack: self.slack,
            forced: self.relaxed,
        }
    }
}

/// Evaluate a complete ordered sequence from `start`.
///
/// Returns the populated visit, or `None` if any stop breaks a rule.
pub fn evaluate(
    oracle: &dyn DistanceOracle,
    start: &StartState,
    vehicle: VehicleId,
    stops: &[Stop],
) -> Option<Visit> {
    let mut builder = PathBuilder::new(oracle, start);
    for stop in stops {
        if !builder.push(*stop) {
            return None;
        }
    }
    Some(builder.finish(vehicle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Request, TimeWindow};
    use crate::oracle::MatrixOracle;

    /// Nodes on a line, 50 s apart.
    fn line() -> MatrixOracle {
        MatrixOracle::from_fn(6, |a, b| Some((a.abs_diff(b) * 50) as Seconds))
    }

    fn request(id: u32, from: u32, to: u32, pickup: (u32, u32), dropoff: (u32, u32)) -> Request {
        Request::with_windows(
            RequestId(id),
            NodeId(from),
            NodeId(to),
            TimeWindow::new(pickup.0, pickup.1),
            TimeWindow::new(dropoff.0, dropoff.1),
        )
    }

    fn start_at(node: u32, capacity: u32) -> StartState {
        StartState {
            node: NodeId(node),
            departure: 0,
            now: 0,
            load: 0,
            capacity,
            deadline: Seconds::MAX,
            detour: None,
        }
    }

    #[test]
    fn single_request_on_time_has_no_delay() {
        let oracle = line();
        let a = request(1, 1, 2, (0, 100), (0, 200)).direct_travel(50);
        let visit = evaluate(&oracle, &start_at(1, 1), VehicleId(1), &[a.pickup(), a.dropoff()])
            .expect("feasible");
        assert_eq!(visit.arrivals, vec![0, 50]);
        assert_eq!(visit.delay, 0);
        assert_eq!(visit.requests, vec![RequestId(1)]);
    }

    #[test]
    fn dropoff_delay_measured_from_window_opening() {
        let oracle = line();
        let a = request(1, 1, 2, (0, 100), (50, 200));
        let visit = evaluate(&oracle, &start_at(0, 1), VehicleId(1), &[a.pickup(), a.dropoff()])
            .expect("feasible");
        assert_eq!(visit.arrivals, vec![50, 100]);
        assert_eq!(visit.delay, 50);
    }

    #[test]
    fn early_arrival_waits_and_counts_idleness() {
        let oracle = line();
        let a = request(1, 1, 2, (120, 300), (170, 400));
        let visit = evaluate(&oracle, &start_at(0, 1), VehicleId(1), &[a.pickup(), a.dropoff()])
            .expect("feasible");
        assert_eq!(visit.arrivals, vec![120, 170]);
        assert_eq!(visit.idleness, 70);
        assert_eq!(visit.delay, 0);
    }

    #[test]
    fn late_arrival_is_infeasible() {
        let oracle = line();
        let a = request(1, 5, 4, (0, 100), (0, 400));
        assert!(evaluate(&oracle, &start_at(0, 1), VehicleId(1), &[a.pickup(), a.dropoff()]).is_none());
    }

    #[test]
    fn capacity_is_enforced() {
        let oracle = line();
        let a = request(1, 1, 3, (0, 500), (0, 900)).seats(2);
        assert!(evaluate(&oracle, &start_at(1, 1), VehicleId(1), &[a.pickup(), a.dropoff()]).is_none());
    }

    #[test]
    fn missing_path_is_infeasible() {
        let oracle = MatrixOracle::from_rows(&[vec![0, -1], vec![10, 0]]).expect("matrix");
        let a = request(1, 0, 1, (0, 100), (0, 200));
        assert!(evaluate(&oracle, &start_at(0, 1), VehicleId(1), &[a.pickup(), a.dropoff()]).is_none());
    }

    #[test]
    fn non_sharing_pickup_is_followed_by_its_own_dropoff() {
        let oracle = line();
        let solo = request(1, 1, 2, (0, 500), (0, 900)).sharing(false);
        let other = request(2, 1, 2, (0, 500), (0, 900));
        let start = start_at(1, 4);

        let interleaved = [solo.pickup(), other.pickup(), solo.dropoff(), other.dropoff()];
        assert!(evaluate(&oracle, &start, VehicleId(1), &interleaved).is_none());

        let solo_boards_last = [other.pickup(), solo.pickup(), solo.dropoff(), other.dropoff()];
        assert!(evaluate(&oracle, &start, VehicleId(1), &solo_boards_last).is_some());

        let back_to_back = [solo.pickup(), solo.dropoff(), other.pickup(), other.dropoff()];
        assert!(evaluate(&oracle, &start, VehicleId(1), &back_to_back).is_some());
    }

    #[test]
    fn sharing_pickup_may_precede_anyone() {
        let oracle = line();
        let solo = request(1, 1, 2, (0, 500), (0, 900)).sharing(false);
        let other = request(2, 1, 3, (0, 500), (0, 900));

        let stops = [other.pickup(), solo.pickup(), solo.dropoff(), other.dropoff()];
        let visit = evaluate(&oracle, &start_at(0, 2), VehicleId(1), &stops).expect("feasible");
        assert_eq!(visit.requests, vec![RequestId(1), RequestId(2)]);
        assert!(visit.stops.windows(2).all(|pair| pair[0].may_precede(&pair[1])));
    }

    #[test]
    fn dropoff_waits_do_not_count_as_idleness() {
        let oracle = line();
        let a = request(1, 1, 2, (0, 100), (300, 400));
        let visit = evaluate(&oracle, &start_at(1, 1), VehicleId(1), &[a.pickup(), a.dropoff()])
            .expect("feasible");
        assert_eq!(visit.arrivals, vec![0, 300]);
        assert_eq!(visit.idleness, 0);
    }

    #[test]
    fn contract_deadline_bounds_last_arrival() {
        let oracle = line();
        let a = request(1, 1, 4, (0, 500), (0, 900));
        let mut start = start_at(1, 1);
        start.deadline = 100;
        assert!(evaluate(&oracle, &start, VehicleId(1), &[a.pickup(), a.dropoff()]).is_none());
        start.deadline = 150;
        assert!(evaluate(&oracle, &start, VehicleId(1), &[a.pickup(), a.dropoff()]).is_some());
    }

    #[test]
    fn en_route_vehicle_diverts_through_waypoint() {
        let oracle = line();
        let a = request(1, 0, 1, (0, 500), (0, 900));
        let mut start = start_at(2, 1);
        start.detour = Some(EnRoute {
            target: NodeId(5),
            waypoint: NodeId(3),
        });
        let visit = evaluate(&oracle, &start, VehicleId(1), &[a.pickup(), a.dropoff()])
            .expect("feasible");
        assert_eq!(visit.stops[0], Stop::Waypoint { node: NodeId(3) });
        assert_eq!(visit.arrivals, vec![50, 200, 250]);

        let towards_target = request(2, 5, 4, (0, 500), (0, 900));
        let visit = evaluate(
            &oracle,
            &start,
            VehicleId(1),
            &[towards_target.pickup(), towards_target.dropoff()],
        )
        .expect("feasible");
        assert_eq!(visit.stops.len(), 2);
    }

    #[test]
    fn arrivals_never_precede_round_time() {
        let oracle = line();
        let a = request(1, 1, 2, (0, 500), (0, 900));
        let mut start = start_at(0, 1);
        start.now = 400;
        let visit = evaluate(&oracle, &start, VehicleId(1), &[a.pickup(), a.dropoff()])
            .expect("feasible");
        assert_eq!(visit.arrivals, vec![400, 450]);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let oracle = line();
        let a = request(1, 1, 3, (0, 500), (0, 900));
        let b = request(2, 2, 4, (0, 500), (0, 900));
        let stops = [a.pickup(), b.pickup(), a.dropoff(), b.dropoff()];
        let first = evaluate(&oracle, &start_at(0, 2), VehicleId(1), &stops);
        let second = evaluate(&oracle, &start_at(0, 2), VehicleId(1), &stops);
        assert_eq!(first, second);
    }

    #[test]
    fn relaxed_builder_ignores_windows() {
        let oracle = line();
        let late = request(1, 0, 5, (0, 10), (0, 10));
        let mut builder = PathBuilder::new(&oracle, &start_at(0, 1)).relaxed();
        assert!(builder.push(late.pickup()));
        assert!(builder.push(late.dropoff()));
        let visit = builder.finish(VehicleId(1));
        assert!(visit.forced);
        assert_eq!(visit.delay, 250);
    }

    #[test]
    fn neutral_builder_starts_at_first_pickup() {
        let oracle = line();
        let a = request(1, 1, 2, (30, 100), (80, 200));
        let mut builder = PathBuilder::from_pickup(&oracle, a.pickup(), 10).expect("open window");
        assert_eq!(builder.arrival(), 30);
        assert!(builder.push(a.dropoff()));
        assert_eq!(builder.delay(), 0);

        let closed = request(2, 1, 2, (0, 5), (0, 200));
        assert!(PathBuilder::from_pickup(&oracle, closed.pickup(), 10).is_none());
    }
}
