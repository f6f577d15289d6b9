use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::model::{Seconds, VehicleId};

use super::rtv::{LevelStats, RtvGraph};
use super::rv::RvGraph;

/// Trip counts of one RTV level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub level: usize,
    pub trips: usize,
    /// Vehicles owning at least one trip of this level.
    pub vehicles: usize,
    pub stats: LevelStats,
}

/// Round summary of the RV and RTV graphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtvSnapshot {
    pub round_time: Seconds,
    pub rv_edges: usize,
    pub rr_edges: usize,
    pub vehicles: usize,
    pub visits: usize,
    pub levels: Vec<LevelSnapshot>,
    pub timed_out: Vec<VehicleId>,
}

impl RtvSnapshot {
    pub fn capture(round_time: Seconds, rv: &RvGraph, rtv: &RtvGraph) -> Self {
        let mut vehicles_per_level: BTreeMap<usize, usize> = BTreeMap::new();
        for vehicle in rtv.vehicles() {
            let mut levels: Vec<usize> = rtv
                .visits_of(vehicle)
                .iter()
                .map(|id| rtv.visit(*id).level())
                .collect();
            levels.sort_unstable();
            levels.dedup();
            for level in levels {
                *vehicles_per_level.entry(level).or_default() += 1;
            }
        }

        let trips = rtv.trips_per_level();
        let levels = trips
            .keys()
            .chain(rtv.level_stats().keys())
            .copied()
            .collect::<std::collections::BTreeSet<usize>>()
            .into_iter()
            .map(|level| LevelSnapshot {
                level,
                trips: trips.get(&level).copied().unwrap_or(0),
                vehicles: vehicles_per_level.get(&level).copied().unwrap_or(0),
                stats: rtv.level_stats().get(&level).copied().unwrap_or_default(),
            })
            .collect();

        Self {
            round_time,
            rv_edges: rv.rv_edge_count(),
            rr_edges: rv.rr_edge_count(),
            vehicles: rtv.vehicles().count(),
            visits: rtv.visit_count(),
            levels,
            timed_out: rtv.timed_out().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
