use h3o::{CellIndex, LatLng};

use super::DistanceOracle;
use crate::model::{NodeId, Seconds};

/// Nodes are H3 cells; travel time is the Haversine distance driven at `speed_kmh`.
#[derive(Debug, Clone)]
pub struct H3Oracle {
    cells: Vec<CellIndex>,
    speed_kmh: f64,
}

impl H3Oracle {
    /// `cells[i]` is the location of `NodeId(i)`.
    pub fn new(cells: Vec<CellIndex>, speed_kmh: f64) -> Self {
        Self {
            cells,
            speed_kmh: speed_kmh.max(1.0),
        }
    }

    pub fn cell(&self, node: NodeId) -> Option<CellIndex> {
        self.cells.get(node.index()).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn haversine_km(a: CellIndex, b: CellIndex) -> f64 {
    let a: LatLng = a.into();
    let b: LatLng = b.into();
    let (lat1, lon1) = (a.lat().to_radians(), a.lng().to_radians());
    let (lat2, lon2) = (b.lat().to_radians(), b.lng().to_radians());
    let sin_dlat = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon = ((lon2 - lon1) * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    6371.0 * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

impl DistanceOracle for H3Oracle {
    fn travel_secs(&self, from: NodeId, to: NodeId) -> Option<Seconds> {
        let from = self.cell(from)?;
        let to = self.cell(to)?;
        if from == to {
            return Some(0);
        }
        let secs = haversine_km(from, to) / self.speed_kmh * 3600.0;
        Some(secs.round() as Seconds)
    }
}
