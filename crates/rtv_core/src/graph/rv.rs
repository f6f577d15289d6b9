use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::config::MatchingConfig;
use crate::feasibility::{PathBuilder, StartState};
use crate::insertion::best_insertion;
use crate::model::{Request, RequestId, Seconds, Stop, Vehicle, VehicleId};
use crate::oracle::DistanceOracle;

/// A vehicle can serve a request on its own, at `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RvEdge {
    pub request: RequestId,
    pub vehicle: VehicleId,
    pub delay: u64,
    /// The vehicle was hired on demand for this request.
    pub hiring: bool,
}

/// Two requests can share one trip; `delay` is the best interleaving's delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RrEdge {
    pub low: RequestId,
    pub high: RequestId,
    pub delay: u64,
}

/// Request-vehicle and request-request compatibility for one round.
#[derive(Debug, Clone, Default)]
pub struct RvGraph {
    rv: Vec<RvEdge>,
    by_vehicle: HashMap<VehicleId, Vec<RequestId>>,
    by_request: HashMap<RequestId, Vec<VehicleId>>,
    rr: HashMap<(RequestId, RequestId), u64>,
}

impl RvGraph {
    /// Build both edge sets. Rows are computed independently per request and
    /// merged afterwards, on the rayon pool when `config.parallel` is set.
    pub fn build(
        oracle: &dyn DistanceOracle,
        now: Seconds,
        requests: &[Request],
        vehicles: &[Vehicle],
        config: &MatchingConfig,
    ) -> Self {
        let starts: Vec<(StartState, Vec<Stop>)> = vehicles
            .iter()
            .map(|vehicle| (StartState::of_vehicle(vehicle, now), vehicle.committed_dropoffs()))
            .collect();

        let rv_row = |request: &Request| -> Vec<RvEdge> {
            let edges = vehicles
                .iter()
                .zip(&starts)
                .filter(|(vehicle, _)| vehicle.hired_for.map_or(true, |hired| hired == request.id))
                .filter_map(|(vehicle, (start, base))| {
                    best_insertion(oracle, start, vehicle.id, base, request).map(|visit| RvEdge {
                        request: request.id,
                        vehicle: vehicle.id,
                        delay: visit.delay,
                        hiring: vehicle.hired_for == Some(request.id),
                    })
                })
                .collect();
            cap_rv_row(edges, config.max_edges_rv)
        };

        let rr_row = |index: usize| -> Vec<RrEdge> {
            let first = &requests[index];
            requests[index + 1..]
                .iter()
                .filter_map(|second| {
                    pair_delay(oracle, now, first, second).map(|delay| {
                        let (low, high) = ordered(first.id, second.id);
                        RrEdge { low, high, delay }
                    })
                })
                .collect()
        };

        let (rv_rows, rr_rows): (Vec<Vec<RvEdge>>, Vec<Vec<RrEdge>>) = if config.parallel {
            rayon::join(
                || requests.par_iter().map(rv_row).collect(),
                || (0..requests.len()).into_par_iter().map(rr_row).collect(),
            )
        } else {
            (
                requests.iter().map(rv_row).collect(),
                (0..requests.len()).map(rr_row).collect(),
            )
        };

        let rv: Vec<RvEdge> = rv_rows.into_iter().flatten().collect();
        let rr = cap_rr_edges(rr_rows.into_iter().flatten().collect(), config.max_edges_rr);
        let graph = Self::from_edges(rv, rr);
        debug!(
            rv_edges = graph.rv_edge_count(),
            rr_edges = graph.rr_edge_count(),
            "built RV graph"
        );
        graph
    }

    /// Assemble a graph from precomputed edges.
    pub fn from_edges(rv: Vec<RvEdge>, rr: Vec<RrEdge>) -> Self {
        let mut by_vehicle: HashMap<VehicleId, Vec<RequestId>> = HashMap::new();
        let mut by_request: HashMap<RequestId, Vec<VehicleId>> = HashMap::new();
        for edge in &rv {
            by_vehicle.entry(edge.vehicle).or_default().push(edge.request);
            by_request.entry(edge.request).or_default().push(edge.vehicle);
        }
        for requests in by_vehicle.values_mut() {
            requests.sort_unstable();
            requests.dedup();
        }
        let rr = rr
            .into_iter()
            .map(|edge| (ordered(edge.low, edge.high), edge.delay))
            .collect();
        Self {
            rv,
            by_vehicle,
            by_request,
            rr,
        }
    }

    /// Requests reachable by `vehicle`, sorted by id.
    pub fn requests_for(&self, vehicle: VehicleId) -> &[RequestId] {
        self.by_vehicle.get(&vehicle).map_or(&[], Vec::as_slice)
    }

    /// Vehicles able to serve `request`: the hiring vehicle first, then by delay.
    pub fn vehicles_for(&self, request: RequestId) -> &[VehicleId] {
        self.by_request.get(&request).map_or(&[], Vec::as_slice)
    }

    pub fn rr_delay(&self, a: RequestId, b: RequestId) -> Option<u64> {
        self.rr.get(&ordered(a, b)).copied()
    }

    pub fn shares_trip(&self, a: RequestId, b: RequestId) -> bool {
        self.rr.contains_key(&ordered(a, b))
    }

    pub fn rv_edges(&self) -> &[RvEdge] {
        &self.rv
    }

    /// RR edges sorted by endpoints.
    pub fn rr_edges(&self) -> Vec<RrEdge> {
        let mut edges: Vec<RrEdge> = self
            .rr
            .iter()
            .map(|(&(low, high), &delay)| RrEdge { low, high, delay })
            .collect();
        edges.sort_unstable_by_key(|edge| (edge.low, edge.high));
        edges
    }

    pub fn rv_edge_count(&self) -> usize {
        self.rv.len()
    }

    pub fn rr_edge_count(&self) -> usize {
        self.rr.len()
    }
}

fn ordered(a: RequestId, b: RequestId) -> (RequestId, RequestId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Keep the best `cap` ordinary edges plus the hiring edge, whatever its rank.
fn cap_rv_row(mut edges: Vec<RvEdge>, cap: Option<usize>) -> Vec<RvEdge> {
    edges.sort_unstable_by_key(|edge| (!edge.hiring, edge.delay, edge.vehicle));
    let Some(cap) = cap else {
        return edges;
    };
    let hiring = edges.iter().take_while(|edge| edge.hiring).count();
    edges.truncate(hiring + cap);
    edges
}

/// Each request keeps its `cap` best neighbours; an edge survives if either
/// endpoint keeps it.
fn cap_rr_edges(edges: Vec<RrEdge>, cap: Option<usize>) -> Vec<RrEdge> {
    let Some(cap) = cap else {
        return edges;
    };
    let mut neighbours: HashMap<RequestId, Vec<(u64, RequestId, usize)>> = HashMap::new();
    for (index, edge) in edges.iter().enumerate() {
        neighbours.entry(edge.low).or_default().push((edge.delay, edge.high, index));
        neighbours.entry(edge.high).or_default().push((edge.delay, edge.low, index));
    }
    let mut keep = vec![false; edges.len()];
    for list in neighbours.values_mut() {
        list.sort_unstable();
        for &(_, _, index) in list.iter().take(cap) {
            keep[index] = true;
        }
    }
    edges
        .into_iter()
        .zip(keep)
        .filter_map(|(edge, kept)| kept.then_some(edge))
        .collect()
}

/// Lowest delay over the six pickup-before-drop-off orders of two requests,
/// from a vehicle-neutral start at the first pickup.
///
/// Requests pair only when both accept sharing; a request that refuses it
/// never appears in a multi-request trip.
pub fn pair_delay(
    oracle: &dyn DistanceOracle,
    now: Seconds,
    first: &Request,
    second: &Request,
) -> Option<u64> {
    if !first.sharing_allowed || !second.sharing_allowed {
        return None;
    }
    let (pk1, dp1) = (first.pickup(), first.dropoff());
    let (pk2, dp2) = (second.pickup(), second.dropoff());
    let orders: [[Stop; 4]; 6] = [
        [pk1, pk2, dp1, dp2],
        [pk1, pk2, dp2, dp1],
        [pk1, dp1, pk2, dp2],
        [pk2, pk1, dp1, dp2],
        [pk2, pk1, dp2, dp1],
        [pk2, dp2, pk1, dp1],
    ];
    orders
        .iter()
        .filter_map(|order| {
            let mut builder = PathBuilder::from_pickup(oracle, order[0], now)?;
            order[1..]
                .iter()
                .all(|stop| builder.push(*stop))
                .then(|| builder.delay())
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeId, TimeWindow};
    use crate::oracle::MatrixOracle;

    fn line() -> MatrixOracle {
        MatrixOracle::from_fn(6, |a, b| Some((a.abs_diff(b) * 50) as Seconds))
    }

    fn request(id: u32, from: u32, to: u32, latest_pickup: u32) -> Request {
        Request::with_windows(
            RequestId(id),
            NodeId(from),
            NodeId(to),
            TimeWindow::new(0, latest_pickup),
            TimeWindow::new(0, 1_000),
        )
    }

    fn vehicle(id: u32, at: u32) -> Vehicle {
        Vehicle::new(VehicleId(id), 2, NodeId(at), 0)
    }

    #[test]
    fn rv_edges_follow_reachability() {
        let oracle = line();
        let requests = vec![request(1, 1, 2, 60), request(2, 5, 4, 60)];
        let vehicles = vec![vehicle(1, 0), vehicle(2, 5)];
        let graph = RvGraph::build(&oracle, 0, &requests, &vehicles, &MatchingConfig::default());

        assert_eq!(graph.requests_for(VehicleId(1)), &[RequestId(1)]);
        assert_eq!(graph.requests_for(VehicleId(2)), &[RequestId(2)]);
        assert_eq!(graph.vehicles_for(RequestId(1)), &[VehicleId(1)]);
    }

    #[test]
    fn vehicles_hired_for_other_requests_are_skipped() {
        let oracle = line();
        let requests = vec![request(1, 1, 2, 500), request(2, 1, 3, 500)];
        let vehicles = vec![vehicle(1, 0).hired_for(RequestId(2))];
        let graph = RvGraph::build(&oracle, 0, &requests, &vehicles, &MatchingConfig::default());

        assert!(graph.vehicles_for(RequestId(1)).is_empty());
        assert_eq!(graph.vehicles_for(RequestId(2)), &[VehicleId(1)]);
        assert!(graph.rv_edges()[0].hiring);
    }

    #[test]
    fn cap_keeps_hiring_edge_beyond_the_limit() {
        let oracle = line();
        let requests = vec![request(1, 1, 2, 500)];
        let vehicles = vec![
            vehicle(1, 1),
            vehicle(2, 2),
            vehicle(3, 5).hired_for(RequestId(1)),
        ];
        let config = MatchingConfig::default().with_edge_caps(Some(1), None);
        let graph = RvGraph::build(&oracle, 0, &requests, &vehicles, &config);

        let mut kept: Vec<VehicleId> = graph.vehicles_for(RequestId(1)).to_vec();
        kept.sort_unstable();
        assert_eq!(kept, vec![VehicleId(1), VehicleId(3)]);
    }

    #[test]
    fn rr_edge_exists_when_some_interleaving_is_feasible() {
        let oracle = line();
        let a = request(1, 1, 3, 100);
        let b = request(2, 2, 3, 100);
        assert!(pair_delay(&oracle, 0, &a, &b).is_some());

        let far = request(3, 5, 4, 0);
        assert_eq!(pair_delay(&oracle, 0, &a, &far), None);
    }

    #[test]
    fn non_sharing_request_has_no_rr_edge_even_back_to_back() {
        let oracle = line();
        let private = Request::with_windows(
            RequestId(1),
            NodeId(1),
            NodeId(2),
            TimeWindow::new(0, 100),
            TimeWindow::new(0, 200),
        )
        .sharing(false);
        let other = Request::with_windows(
            RequestId(2),
            NodeId(1),
            NodeId(2),
            TimeWindow::new(0, 100),
            TimeWindow::new(0, 200),
        );

        // Riding one after the other fits both windows.
        let start = StartState::of_vehicle(&vehicle(1, 1), 0);
        let stops = [private.pickup(), private.dropoff(), other.pickup(), other.dropoff()];
        assert!(crate::feasibility::evaluate(&oracle, &start, VehicleId(1), &stops).is_some());

        assert_eq!(pair_delay(&oracle, 0, &private, &other), None);
        assert_eq!(pair_delay(&oracle, 0, &other, &private), None);
        let shared = Request { id: RequestId(3), ..other.clone() };
        assert!(pair_delay(&oracle, 0, &other, &shared).is_some());
    }

    #[test]
    fn rr_cap_keeps_union_of_best_neighbours() {
        let edges = vec![
            RrEdge {
                low: RequestId(1),
                high: RequestId(2),
                delay: 10,
            },
            RrEdge {
                low: RequestId(1),
                high: RequestId(3),
                delay: 50,
            },
            RrEdge {
                low: RequestId(2),
                high: RequestId(3),
                delay: 60,
            },
        ];
        let kept = cap_rr_edges(edges, Some(1));
        // request 3 keeps its best neighbour (1), requests 1 and 2 keep each other
        let pairs: Vec<(u32, u32)> = kept.iter().map(|e| (e.low.0, e.high.0)).collect();
        assert_eq!(pairs, vec![(1, 2), (1, 3)]);
    }

    #[test]
    fn sequential_and_parallel_builds_agree() {
        let oracle = line();
        let requests: Vec<Request> = (0..5).map(|i| request(i, i, (i + 2) % 6, 400)).collect();
        let vehicles = vec![vehicle(1, 0), vehicle(2, 3)];
        let parallel = RvGraph::build(&oracle, 0, &requests, &vehicles, &MatchingConfig::default());
        let sequential = RvGraph::build(
            &oracle,
            0,
            &requests,
            &vehicles,
            &MatchingConfig::default().with_parallel(false),
        );
        assert_eq!(parallel.rv_edges(), sequential.rv_edges());
        assert_eq!(parallel.rr_edges(), sequential.rr_edges());
    }
}
