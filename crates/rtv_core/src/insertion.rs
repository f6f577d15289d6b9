//! Sequence generation: where to put pickups and drop-offs.
//!
//! Two generators feed the feasibility evaluator:
//!
//! - [`best_insertion`] slots one request into a fixed base route, trying every
//!   pickup position `i` and drop-off position `j > i`.
//! - [`best_sequence`] searches every precedence-respecting order of a set of
//!   requests plus the vehicle's boarded drop-offs, extending feasible prefixes
//!   only and pruning prefixes that already lose against the best full route.

use crate::feasibility::{PathBuilder, StartState};
use crate::model::{Request, Stop, VehicleId, Visit};
use crate::oracle::DistanceOracle;

/// All sequences obtained by inserting `pickup` then `dropoff` into `base`.
pub fn insertions(base: &[Stop], pickup: Stop, dropoff: Stop) -> impl Iterator<Item = Vec<Stop>> + '_ {
    let n = base.len();
    (0..=n).flat_map(move |i| {
        (i..=n).map(move |j| {
            let mut sequence = Vec::with_capacity(n + 2);
            sequence.extend_from_slice(&base[..i]);
            sequence.push(pickup);
            sequence.extend_from_slice(&base[i..j]);
            sequence.push(dropoff);
            sequence.extend_from_slice(&base[j..]);
            sequence
        })
    })
}

/// Lowest-delay feasible insertion of `request` into `base`.
pub fn best_insertion(
    oracle: &dyn DistanceOracle,
    start: &StartState,
    vehicle: VehicleId,
    base: &[Stop],
    request: &Request,
) -> Option<Visit> {
    let mut best: Option<Visit> = None;
    for sequence in insertions(base, request.pickup(), request.dropoff()) {
        let mut builder = PathBuilder::new(oracle, start);
        if !sequence.iter().all(|stop| builder.push(*stop)) {
            continue;
        }
        let visit = builder.finish(vehicle);
        if best.as_ref().map_or(true, |current| visit.is_better_than(current)) {
            best = Some(visit);
        }
    }
    best
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SlotState {
    AwaitingPickup,
    AwaitingDropoff,
    Done,
}

struct Slot {
    pickup: Option<Stop>,
    dropoff: Stop,
    state: SlotState,
}

struct Search {
    vehicle: VehicleId,
    slots: Vec<Slot>,
    remaining: usize,
    best: Option<Visit>,
}

impl Search {
    fn beaten(&self, builder: &PathBuilder<'_>) -> bool {
        // Every key term only grows as stops are appended and all full routes
        // serve the same requests, so a prefix at or above the best full
        // route cannot win.
        self.best
            .as_ref()
            .is_some_and(|best| builder.quality_key() >= best.quality_key())
    }

    fn extend(&mut self, builder: &PathBuilder<'_>) {
        if self.remaining == 0 {
            let visit = builder.clone().finish(self.vehicle);
            if self.best.as_ref().map_or(true, |best| visit.is_better_than(best)) {
                self.best = Some(visit);
            }
            return;
        }
        for index in 0..self.slots.len() {
            let (stop, next_state) = match self.slots[index].state {
                SlotState::AwaitingPickup => match self.slots[index].pickup {
                    Some(pickup) => (pickup, SlotState::AwaitingDropoff),
                    None => continue,
                },
                SlotState::AwaitingDropoff => (self.slots[index].dropoff, SlotState::Done),
                SlotState::Done => continue,
            };
            let mut next = builder.clone();
            if !next.push(stop) || self.beaten(&next) {
                continue;
            }
            let previous = self.slots[index].state;
            self.slots[index].state = next_state;
            self.remaining -= 1;
            self.extend(&next);
            self.remaining += 1;
            self.slots[index].state = previous;
        }
    }
}

/// Best route serving every request in `requests` together with the boarded
/// drop-offs in `onboard`.
///
/// Stops are tried in request-id order at every position, so among equally
/// good routes the first one found wins and the result is deterministic.
pub fn best_sequence<'o>(
    oracle: &'o dyn DistanceOracle,
    start: &StartState,
    vehicle: VehicleId,
    requests: &[&Request],
    onboard: &[Stop],
) -> Option<Visit> {
    search(PathBuilder::new(oracle, start), vehicle, requests, onboard)
}

/// Same as [`best_sequence`] but with time windows and the contract deadline
/// relaxed. Used to guarantee boarded passengers are always delivered.
pub fn forced_sequence<'o>(
    oracle: &'o dyn DistanceOracle,
    start: &StartState,
    vehicle: VehicleId,
    onboard: &[Stop],
) -> Option<Visit> {
    search(PathBuilder::new(oracle, start).relaxed(), vehicle, &[], onboard)
}

fn search<'o>(
    root: PathBuilder<'o>,
    vehicle: VehicleId,
    requests: &[&Request],
    onboard: &[Stop],
) -> Option<Visit> {
    let mut ordered: Vec<&Request> = requests.to_vec();
    ordered.sort_by_key(|request| request.id);

    let mut slots: Vec<Slot> = ordered
        .iter()
        .map(|request| Slot {
            pickup: Some(request.pickup()),
            dropoff: request.dropoff(),
            state: SlotState::AwaitingPickup,
        })
        .collect();
    slots.extend(onboard.iter().map(|dropoff| Slot {
        pickup: None,
        dropoff: *dropoff,
        state: SlotState::AwaitingDropoff,
    }));

    let remaining = ordered.len() * 2 + onboard.len();
    let mut search = Search {
        vehicle,
        slots,
        remaining,
        best: None,
    };
    search.extend(&root);
    search.best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnRoute, NodeId, RequestId, Seconds, TimeWindow};
    use crate::oracle::MatrixOracle;

    fn line() -> MatrixOracle {
        MatrixOracle::from_fn(8, |a, b| Some((a.abs_diff(b) * 10) as Seconds))
    }

    fn request(id: u32, from: u32, to: u32, latest_pickup: u32) -> Request {
        Request::with_windows(
            RequestId(id),
            NodeId(from),
            NodeId(to),
            TimeWindow::new(0, latest_pickup),
            TimeWindow::new(0, 1_000),
        )
        .direct_travel(from.abs_diff(to) * 10)
    }

    fn start() -> StartState {
        StartState {
            node: NodeId(0),
            departure: 0,
            now: 0,
            load: 0,
            capacity: 4,
            deadline: Seconds::MAX,
            detour: None,
        }
    }

    #[test]
    fn insertion_positions_keep_pickup_before_dropoff() {
        let base = [
            Stop::Waypoint { node: NodeId(1) },
            Stop::Waypoint { node: NodeId(2) },
        ];
        let r = request(1, 3, 4, 100);
        let all: Vec<Vec<Stop>> = insertions(&base, r.pickup(), r.dropoff()).collect();
        assert_eq!(all.len(), 6);
        for sequence in &all {
            let pickup = sequence.iter().position(Stop::is_pickup).expect("pickup");
            let dropoff = sequence.iter().position(Stop::is_dropoff).expect("dropoff");
            assert!(pickup < dropoff);
            assert_eq!(sequence.len(), 4);
        }
    }

    #[test]
    fn best_insertion_keeps_riding_passenger_on_time() {
        let oracle = line();
        let passenger = request(9, 0, 6, 0);
        let mut start = start();
        start.load = 1;
        let newcomer = request(1, 0, 4, 100);

        let visit = best_insertion(&oracle, &start, VehicleId(1), &[passenger.dropoff()], &newcomer)
            .expect("feasible insertion");
        assert_eq!(visit.delay, 0);
        assert_eq!(visit.requests, vec![RequestId(1)]);
        assert_eq!(visit.passengers, vec![RequestId(9)]);
        assert_eq!(visit.stops.last().map(Stop::node), Some(NodeId(6)));
    }

    #[test]
    fn best_sequence_finds_lowest_delay_order() {
        let oracle = line();
        let near = request(1, 1, 2, 200);
        let far = request(2, 5, 6, 200);
        let visit = best_sequence(&oracle, &start(), VehicleId(1), &[&far, &near], &[])
            .expect("feasible");
        let order: Vec<u32> = visit.stops.iter().map(|stop| stop.node().0).collect();
        assert_eq!(order, vec![1, 2, 5, 6]);
        assert_eq!(visit.requests, vec![RequestId(1), RequestId(2)]);
    }

    #[test]
    fn best_sequence_matches_exhaustive_insertion_for_single_request() {
        let oracle = line();
        let r = request(1, 3, 1, 200);
        let by_search = best_sequence(&oracle, &start(), VehicleId(1), &[&r], &[]).expect("search");
        let by_insertion = best_insertion(&oracle, &start(), VehicleId(1), &[], &r).expect("insertion");
        assert_eq!(by_search.delay, by_insertion.delay);
        assert_eq!(by_search.stops, by_insertion.stops);
    }

    #[test]
    fn delay_ties_prefer_shorter_routes_over_less_waiting() {
        let oracle = line();
        let mut start = start();
        start.node = NodeId(2);
        start.detour = Some(EnRoute {
            target: NodeId(5),
            waypoint: NodeId(3),
        });
        // Neither drop-off can be late, so every order has zero delay.
        let at_target = Request::with_windows(
            RequestId(1),
            NodeId(5),
            NodeId(6),
            TimeWindow::new(100, 1_000),
            TimeWindow::new(0, 1_000),
        )
        .direct_travel(500);
        let off_route = Request::with_windows(
            RequestId(2),
            NodeId(3),
            NodeId(0),
            TimeWindow::new(0, 1_000),
            TimeWindow::new(0, 1_000),
        )
        .direct_travel(500);

        // Starting at the target waits 70 s at node 5 over four stops; the
        // detour through node 3 waits only 10 s but adds the waypoint.
        let searched = best_sequence(&oracle, &start, VehicleId(1), &[&at_target, &off_route], &[])
            .expect("sequence");
        assert_eq!(searched.quality_key(), (0, 4, 70));
        assert_eq!(searched.stops[0], at_target.pickup());

        let inserted = best_insertion(
            &oracle,
            &start,
            VehicleId(1),
            &[at_target.pickup(), at_target.dropoff()],
            &off_route,
        )
        .expect("insertion");
        assert_eq!(inserted.quality_key(), searched.quality_key());
    }

    #[test]
    fn infeasible_set_yields_none() {
        let oracle = line();
        let a = request(1, 7, 6, 20);
        let b = request(2, 1, 2, 20);
        assert!(best_sequence(&oracle, &start(), VehicleId(1), &[&a, &b], &[]).is_none());
    }

    #[test]
    fn forced_sequence_delivers_late_passengers() {
        let oracle = line();
        let late = Request::with_windows(
            RequestId(4),
            NodeId(0),
            NodeId(7),
            TimeWindow::new(0, 0),
            TimeWindow::new(0, 10),
        );
        let mut start = start();
        start.load = 1;
        assert!(best_sequence(&oracle, &start, VehicleId(1), &[], &[late.dropoff()]).is_none());
        let visit = forced_sequence(&oracle, &start, VehicleId(1), &[late.dropoff()]).expect("forced");
        assert!(visit.forced);
        assert_eq!(visit.passengers, vec![RequestId(4)]);
    }
}
