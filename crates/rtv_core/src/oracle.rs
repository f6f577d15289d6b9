//! Distance/time oracles: the only external collaborator the core consumes.
//!
//! Three implementations:
//!
//! - **`MatrixOracle`**: dense pre-computed travel-time matrix.
//! - **`H3Oracle`**: nodes are H3 cells, travel time is Haversine distance at a fixed speed.
//! - **`NetworkOracle`**: shortest paths over a weighted road graph, rows cached in an LRU.
//!
//! All of them are `Send + Sync` so a single oracle can be shared by the
//! parallel RV and RTV phases behind an `Arc<dyn DistanceOracle>`.

use crate::error::OracleError;
use crate::model::{NodeId, Seconds};

mod h3;
mod network;

pub use h3::H3Oracle;
pub use network::NetworkOracle;

/// Travel-time lookup between network nodes.
pub trait DistanceOracle: Send + Sync {
    /// Travel time in seconds from `from` to `to`, or `None` when no path exists.
    fn travel_secs(&self, from: NodeId, to: NodeId) -> Option<Seconds>;
}

impl<T: DistanceOracle + ?Sized> DistanceOracle for std::sync::Arc<T> {
    fn travel_secs(&self, from: NodeId, to: NodeId) -> Option<Seconds> {
        (**self).travel_secs(from, to)
    }
}

// ---------------------------------------------------------------------------
// Matrix oracle
// ---------------------------------------------------------------------------

/// Dense travel-time matrix indexed by node id.
#[derive(Debug, Clone)]
pub struct MatrixOracle {
    size: usize,
    cells: Vec<Option<Seconds>>,
}

impl MatrixOracle {
    /// Build from square rows where a negative entry means "no path".
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self, OracleError> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(OracleError::NotSquare {
                    row: index,
                    len: row.len(),
                    expected: size,
                });
            }
            for &value in row {
                let cell = if value < 0 {
                    None
                } else {
                    Some(Seconds::try_from(value).map_err(|_| OracleError::OutOfRange(value))?)
                };
                cells.push(cell);
            }
        }
        Ok(Self { size, cells })
    }

    /// Build from a function of node indices, e.g. a synthetic grid.
    pub fn from_fn(size: usize, f: impl Fn(usize, usize) -> Option<Seconds>) -> Self {
        let mut cells = Vec::with_capacity(size * size);
        for from in 0..size {
            for to in 0..size {
                cells.push(f(from, to));
            }
        }
        Self { size, cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl DistanceOracle for MatrixOracle {
    fn travel_secs(&self, from: NodeId, to: NodeId) -> Option<Seconds> {
        let (from, to) = (from.index(), to.index());
        if from >= self.size || to >= self.size {
            return None;
        }
        self.cells[from * self.size + to]
    }
}
