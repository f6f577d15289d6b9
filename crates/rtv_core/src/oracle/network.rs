use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use pathfinding::prelude::dijkstra_all;

use super::DistanceOracle;
use crate::error::OracleError;
use crate::model::{NodeId, Seconds};

type Row = Arc<HashMap<NodeId, Seconds>>;

/// Shortest-path travel times over a directed road graph.
///
/// A query computes the full shortest-path row of its source with Dijkstra and
/// keeps the row in an LRU cache, so repeated lookups from the same node are O(1).
pub struct NetworkOracle {
    adjacency: Vec<Vec<(NodeId, Seconds)>>,
    rows: Mutex<LruCache<NodeId, Row>>,
}

impl NetworkOracle {
    pub fn new(
        node_count: usize,
        edges: &[(NodeId, NodeId, Seconds)],
        cache_capacity: usize,
    ) -> Result<Self, OracleError> {
        let mut adjacency = vec![Vec::new(); node_count];
        for &(from, to, secs) in edges {
            if from.index() >= node_count {
                return Err(OracleError::UnknownNode(from));
            }
            if to.index() >= node_count {
                return Err(OracleError::UnknownNode(to));
            }
            adjacency[from.index()].push((to, secs));
        }
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            adjacency,
            rows: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn compute_row(&self, source: NodeId) -> Row {
        let reached = dijkstra_all(&source, |node: &NodeId| {
            self.adjacency
                .get(node.index())
                .cloned()
                .unwrap_or_default()
        });
        let mut row: HashMap<NodeId, Seconds> =
            reached.into_iter().map(|(node, (_, cost))| (node, cost)).collect();
        row.insert(source, 0);
        Arc::new(row)
    }

    fn row(&self, source: NodeId) -> Row {
        if let Ok(mut rows) = self.rows.lock() {
            if let Some(row) = rows.get(&source) {
                return Arc::clone(row);
            }
        }
        let row = self.compute_row(source);
        if let Ok(mut rows) = self.rows.lock() {
            rows.put(source, Arc::clone(&row));
        }
        row
    }
}

impl DistanceOracle for NetworkOracle {
    fn travel_secs(&self, from: NodeId, to: NodeId) -> Option<Seconds> {
        if from.index() >= self.adjacency.len() || to.index() >= self.adjacency.len() {
            return None;
        }
        if from == to {
            return Some(0);
        }
        self.row(from).get(&to).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> NetworkOracle {
        // 0 -> 1 -> 2 -> 3, plus a slow shortcut 0 -> 3
        NetworkOracle::new(
            5,
            &[
                (NodeId(0), NodeId(1), 10),
                (NodeId(1), NodeId(2), 10),
                (NodeId(2), NodeId(3), 10),
                (NodeId(0), NodeId(3), 45),
            ],
            4,
        )
        .expect("network")
    }

    #[test]
    fn picks_shortest_path() {
        let oracle = ring();
        assert_eq!(oracle.travel_secs(NodeId(0), NodeId(3)), Some(30));
        assert_eq!(oracle.travel_secs(NodeId(1), NodeId(3)), Some(20));
    }

    #[test]
    fn unreachable_and_directed() {
        let oracle = ring();
        assert_eq!(oracle.travel_secs(NodeId(3), NodeId(0)), None);
        assert_eq!(oracle.travel_secs(NodeId(0), NodeId(4)), None);
        assert_eq!(oracle.travel_secs(NodeId(4), NodeId(4)), Some(0));
    }

    #[test]
    fn rejects_edges_to_unknown_nodes() {
        let result = NetworkOracle::new(2, &[(NodeId(0), NodeId(7), 1)], 1);
        assert!(matches!(result, Err(OracleError::UnknownNode(NodeId(7)))));
    }
}
