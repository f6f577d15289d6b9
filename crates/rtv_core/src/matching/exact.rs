//! Exact assignment as a 0/1 program.
//!
//! One binary per candidate visit and one rejection binary per uncommitted
//! request:
//!
//! ```text
//! minimize   lex( sum reject_r , sum delay_t * x_t )
//! subject to sum_{t of v} x_t = 1                      for every vehicle v
//!            sum_{t serving r} x_t + reject_r = 1      for every new request r
//!            sum_{t serving r} x_t = 1                 for every committed request r
//! ```
//!
//! Rejections strictly dominate delay. Committed requests get no rejection
//! variable, so losing one makes the model infeasible; the conflicting rows are
//! then named and the previous plan is kept.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::MatchingConfig;
use crate::error::SolverError;
use crate::model::{RequestId, VehicleId, VisitId};
use crate::solver::{default_backend, BackendFactory, MilpBackend, Objective, Sense, SolveStatus, VarId};

use super::greedy::GreedyAssignment;
use super::result::{Assignment, AssignmentOutcome};
use super::{AssignmentInput, AssignmentStrategy};

/// Variables of one assignment model.
#[derive(Debug, Clone, Default)]
pub struct AssignmentModel {
    /// Visit variables, grouped by vehicle in roster order.
    pub choices: Vec<(VarId, VisitId)>,
    pub rejections: Vec<(VarId, RequestId)>,
    /// Committed requests with a must-be-served row.
    pub committed: Vec<RequestId>,
}

impl AssignmentModel {
    /// Translate a per-vehicle selection into a full solution hint.
    ///
    /// Vehicles missing from `selection` take their first candidate. Requests
    /// left uncovered are marked rejected.
    pub fn hint_from(
        &self,
        input: &AssignmentInput<'_>,
        selection: &BTreeMap<VehicleId, VisitId>,
    ) -> Vec<(VarId, bool)> {
        let mut hint = Vec::with_capacity(self.choices.len() + self.rejections.len());
        let mut covered = Vec::new();
        for &(var, visit_id) in &self.choices {
            let visit = input.rtv.visit(visit_id);
            let on = match selection.get(&visit.vehicle) {
                Some(selected) => *selected == visit_id,
                None => input.rtv.visits_of(visit.vehicle).first() == Some(&visit_id),
            };
            if on {
                covered.extend(visit.requests.iter().copied());
            }
            hint.push((var, on));
        }
        for &(var, request) in &self.rejections {
            hint.push((var, !covered.contains(&request)));
        }
        hint
    }
}

/// Solves the assignment exactly with a pluggable backend.
#[derive(Clone)]
pub struct ExactAssignment {
    backend: BackendFactory,
    time_limit: Duration,
    mip_gap: f64,
    conflict_time_limit: Duration,
    warm_start: bool,
}

impl fmt::Debug for ExactAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactAssignment")
            .field("time_limit", &self.time_limit)
            .field("mip_gap", &self.mip_gap)
            .field("conflict_time_limit", &self.conflict_time_limit)
            .field("warm_start", &self.warm_start)
            .finish_non_exhaustive()
    }
}

impl Default for ExactAssignment {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl ExactAssignment {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            backend: default_backend(),
            time_limit: config.solver_time_limit(),
            mip_gap: config.mip_gap,
            conflict_time_limit: config.conflict_time_limit(),
            warm_start: config.warm_start,
        }
    }

    /// Swap the solver library behind the model.
    pub fn with_backend(mut self, backend: BackendFactory) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    /// Declare variables, constraints and objectives of one round on `backend`.
    pub fn build_model(
        &self,
        backend: &mut dyn MilpBackend,
        input: &AssignmentInput<'_>,
    ) -> Result<AssignmentModel, SolverError> {
        let rtv = input.rtv;
        let mut model = AssignmentModel::default();
        let mut var_of: HashMap<VisitId, VarId> = HashMap::new();
        let mut delay_terms = Vec::new();

        for vehicle in rtv.vehicles() {
            let mut row = Vec::new();
            for &visit_id in rtv.visits_of(vehicle) {
                let var = backend.add_binary(&format!("x_v{}_t{}", vehicle.0, visit_id.0));
                let delay = i64::try_from(rtv.visit(visit_id).delay)
                    .map_err(|_| SolverError::Overflow(format!("delay of visit {visit_id}")))?;
                if delay != 0 {
                    delay_terms.push((var, delay));
                }
                var_of.insert(visit_id, var);
                model.choices.push((var, visit_id));
                row.push((var, 1));
            }
            backend.add_constraint(&format!("vehicle_{}_one_visit", vehicle.0), &row, Sense::Eq, 1)?;
        }

        let mut rejection_terms = Vec::new();
        for request in input.requests {
            let mut row: Vec<(VarId, i64)> = rtv
                .visits_serving(request.id)
                .iter()
                .filter_map(|visit_id| var_of.get(visit_id))
                .map(|var| (*var, 1))
                .collect();
            if request.previously_assigned {
                if row.is_empty() {
                    warn!(request = %request.id, "committed request has no candidate visit");
                }
                backend.add_constraint(
                    &format!("request_{}_must_be_served", request.id.0),
                    &row,
                    Sense::Eq,
                    1,
                )?;
                model.committed.push(request.id);
            } else {
                let reject = backend.add_binary(&format!("reject_r{}", request.id.0));
                row.push((reject, 1));
                backend.add_constraint(
                    &format!("request_{}_covered_or_rejected", request.id.0),
                    &row,
                    Sense::Eq,
                    1,
                )?;
                rejection_terms.push((reject, 1));
                model.rejections.push((reject, request.id));
            }
        }

        backend.set_objectives(vec![
            Objective::new("total_rejections", rejection_terms),
            Objective::new("total_delay", delay_terms),
        ])?;
        Ok(model)
    }

    fn solve(&self, input: &AssignmentInput<'_>) -> Result<Assignment, SolverError> {
        let started = Instant::now();
        let mut backend = (self.backend)();
        let model = self.build_model(backend.as_mut(), input)?;
        backend.set_time_limit(self.time_limit);
        backend.set_mip_gap(self.mip_gap);
        if self.warm_start {
            let selection = GreedyAssignment::new().select(input);
            backend.set_warm_start(&model.hint_from(input, &selection))?;
        }

        let status = backend.solve()?;
        let outcome = match status {
            SolveStatus::Optimal => AssignmentOutcome::Optimal,
            SolveStatus::TimeLimit {
                has_incumbent: true,
            } => AssignmentOutcome::Incumbent,
            SolveStatus::TimeLimit {
                has_incumbent: false,
            } => {
                warn!(
                    limit_ms = self.time_limit.as_millis() as u64,
                    "assignment solver hit its time limit without a solution, keeping previous plan"
                );
                return Ok(Assignment::fallback(input, Vec::new()));
            }
            SolveStatus::Infeasible => {
                let conflict = backend
                    .compute_conflict(self.conflict_time_limit)
                    .unwrap_or_else(|err| {
                        warn!(%err, "conflict analysis failed");
                        Vec::new()
                    });
                warn!(?conflict, "assignment model infeasible, keeping previous plan");
                return Ok(Assignment::fallback(input, conflict));
            }
        };

        let mut assignment = Assignment::new(outcome);
        for &(var, visit_id) in &model.choices {
            match backend.value(var) {
                Some(true) => assignment.choose(input.rtv.visit(visit_id).clone()),
                Some(false) => {}
                None => return Err(SolverError::NoSolution(format!("{status:?}"))),
            }
        }
        assignment.complete_with_baselines(input);

        let objectives = backend.objective_values();
        info!(
            ?outcome,
            rejections = objectives.first().copied().unwrap_or_default(),
            delay = objectives.get(1).copied().unwrap_or_default(),
            variables = model.choices.len() + model.rejections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "exact assignment solved"
        );
        Ok(assignment)
    }
}

impl AssignmentStrategy for ExactAssignment {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn assign(&self, input: &AssignmentInput<'_>) -> Assignment {
        match self.solve(input) {
            Ok(assignment) => assignment,
            Err(err) => {
                error!(%err, "assignment solver failed, keeping previous plan");
                Assignment::fallback(input, Vec::new())
            }
        }
    }
}
