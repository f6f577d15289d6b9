//! 0/1 linear programming seam used by the exact assignment strategy.
//!
//! The modeling code only talks to [`MilpBackend`]: add binary variables, add
//! named linear constraints, set prioritized objectives, solve, read values.
//! Any MILP library can sit behind it. [`BranchAndBound`] is the built-in
//! backend, sized for assignment models (exactly-one rows over binaries).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SolverError;

mod branch_bound;
mod conflict;

pub use branch_bound::BranchAndBound;
pub use conflict::deletion_filter;

/// Handle of a binary variable inside one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

/// One minimization objective. Objectives passed together are ranked by
/// position: an earlier objective always dominates every later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    pub name: String,
    pub terms: Vec<(VarId, i64)>,
}

impl Objective {
    pub fn new(name: impl Into<String>, terms: Vec<(VarId, i64)>) -> Self {
        Self {
            name: name.into(),
            terms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    /// Stopped at the time limit; values are readable if an incumbent exists.
    TimeLimit { has_incumbent: bool },
    Infeasible,
}

impl SolveStatus {
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal
                | SolveStatus::TimeLimit {
                    has_incumbent: true
                }
        )
    }
}

/// Minimal interface of a 0/1 solver backend.
pub trait MilpBackend: Send {
    fn add_binary(&mut self, name: &str) -> VarId;

    /// Add `sum(coef * var) <sense> rhs` under a unique diagnostic name.
    fn add_constraint(
        &mut self,
        name: &str,
        terms: &[(VarId, i64)],
        sense: Sense,
        rhs: i64,
    ) -> Result<(), SolverError>;

    /// Replace the objectives, highest priority first.
    fn set_objectives(&mut self, objectives: Vec<Objective>) -> Result<(), SolverError>;

    fn set_time_limit(&mut self, limit: Duration);

    /// Relative gap between incumbent and bound at which search stops.
    fn set_mip_gap(&mut self, gap: f64);

    /// Initial solution hint; unspecified variables default to 0.
    fn set_warm_start(&mut self, values: &[(VarId, bool)]) -> Result<(), SolverError>;

    fn solve(&mut self) -> Result<SolveStatus, SolverError>;

    /// Value of `var` in the best solution found, if any.
    fn value(&self, var: VarId) -> Option<bool>;

    /// Value of each objective in the best solution found, in priority order.
    fn objective_values(&self) -> Vec<i64>;

    /// Names of a minimal set of constraints that cannot hold together.
    ///
    /// Only meaningful after `solve` reported [`SolveStatus::Infeasible`].
    fn compute_conflict(&mut self, limit: Duration) -> Result<Vec<String>, SolverError>;
}

/// Builds a fresh backend for every model.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn MilpBackend> + Send + Sync>;

/// Factory for the built-in [`BranchAndBound`] backend.
pub fn default_backend() -> BackendFactory {
    Arc::new(|| Box::new(BranchAndBound::new()) as Box<dyn MilpBackend>)
}
