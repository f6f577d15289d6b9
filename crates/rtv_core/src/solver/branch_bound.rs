//! Depth-first 0/1 branch and bound.
//!
//! - Row activities (`min_act`, `max_act`) are maintained incrementally and
//!   drive bound propagation; fixings are recorded on a trail and undone on
//!   backtrack.
//! - Prioritized objectives are folded into one weighted objective where each
//!   weight exceeds the full range of every lower-priority objective.
//! - The lower bound is Lagrangian: equality rows owning a private column
//!   (a variable in no other row) are dualized at that column's cost, and a
//!   disjoint family of exactly-one rows is kept as a choice constraint.
//! - Branching picks the unsatisfied exactly-one row with the fewest free
//!   variables and tries its candidates cheapest first.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::SolverError;

use super::conflict::deletion_filter;
use super::{MilpBackend, Objective, Sense, SolveStatus, VarId};

#[derive(Debug, Clone)]
struct Row {
    name: String,
    terms: Vec<(usize, i64)>,
    sense: Sense,
    rhs: i64,
}

impl Row {
    fn is_choice(&self) -> bool {
        self.sense == Sense::Eq
            && self.rhs == 1
            && !self.terms.is_empty()
            && self.terms.iter().all(|&(_, coef)| coef == 1)
    }
}

/// Built-in exact backend.
#[derive(Debug, Clone)]
pub struct BranchAndBound {
    names: Vec<String>,
    rows: Vec<Row>,
    columns: Vec<Vec<(usize, i64)>>,
    objectives: Vec<Objective>,
    time_limit: Duration,
    mip_gap: f64,
    warm_start: Option<Vec<bool>>,
    solution: Option<Vec<bool>>,
    nodes: u64,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            rows: Vec::new(),
            columns: Vec::new(),
            objectives: Vec::new(),
            time_limit: Duration::from_secs(10),
            mip_gap: 0.0,
            warm_start: None,
            solution: None,
            nodes: 0,
        }
    }

    /// Search nodes explored by the last `solve`.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn variable_count(&self) -> usize {
        self.names.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.rows.len()
    }

    fn check_var(&self, var: VarId) -> Result<usize, SolverError> {
        if var.0 < self.names.len() {
            Ok(var.0)
        } else {
            Err(SolverError::UnknownVariable(var.0))
        }
    }

    /// Fold the prioritized objectives into one cost vector.
    fn folded_costs(&self) -> Result<Vec<i64>, SolverError> {
        let mut costs = vec![0i64; self.names.len()];
        let mut multiplier: i64 = 1;
        let mut lower_range: i64 = 0;
        for objective in self.objectives.iter().rev() {
            let overflow = || SolverError::Overflow(objective.name.clone());
            let mut range: i64 = 0;
            for &(var, coef) in &objective.terms {
                let index = self.check_var(var)?;
                let weighted = coef.checked_mul(multiplier).ok_or_else(overflow)?;
                costs[index] = costs[index].checked_add(weighted).ok_or_else(overflow)?;
                range = range.checked_add(coef.checked_abs().ok_or_else(overflow)?).ok_or_else(overflow)?;
            }
            lower_range = range
                .checked_mul(multiplier)
                .and_then(|scaled| scaled.checked_add(lower_range))
                .ok_or_else(overflow)?;
            multiplier = lower_range.checked_add(1).ok_or_else(overflow)?;
        }
        Ok(costs)
    }

    fn satisfies(&self, values: &[bool]) -> bool {
        self.rows.iter().all(|row| {
            let activity: i64 = row
                .terms
                .iter()
                .filter(|(var, _)| values[*var])
                .map(|(_, coef)| *coef)
                .sum();
            match row.sense {
                Sense::Le => activity <= row.rhs,
                Sense::Eq => activity == row.rhs,
                Sense::Ge => activity >= row.rhs,
            }
        })
    }

    fn objective_of(costs: &[i64], values: &[bool]) -> i128 {
        costs
            .iter()
            .zip(values)
            .filter(|(_, on)| **on)
            .map(|(cost, _)| i128::from(*cost))
            .sum()
    }
}

impl MilpBackend for BranchAndBound {
    fn add_binary(&mut self, name: &str) -> VarId {
        self.names.push(name.to_string());
        self.columns.push(Vec::new());
        VarId(self.names.len() - 1)
    }

    fn add_constraint(
        &mut self,
        name: &str,
        terms: &[(VarId, i64)],
        sense: Sense,
        rhs: i64,
    ) -> Result<(), SolverError> {
        let mut row_terms = Vec::with_capacity(terms.len());
        for &(var, coef) in terms {
            let index = self.check_var(var)?;
            if row_terms.iter().any(|(seen, _)| *seen == index) {
                return Err(SolverError::DuplicateTerm {
                    name: name.to_string(),
                    var: index,
                });
            }
            if coef != 0 {
                row_terms.push((index, coef));
            }
        }
        let row = self.rows.len();
        for &(var, coef) in &row_terms {
            self.columns[var].push((row, coef));
        }
        self.rows.push(Row {
            name: name.to_string(),
            terms: row_terms,
            sense,
            rhs,
        });
        Ok(())
    }

    fn set_objectives(&mut self, objectives: Vec<Objective>) -> Result<(), SolverError> {
        for objective in &objectives {
            for &(var, _) in &objective.terms {
                self.check_var(var)?;
            }
        }
        self.objectives = objectives;
        Ok(())
    }

    fn set_time_limit(&mut self, limit: Duration) {
        self.time_limit = limit;
    }

    fn set_mip_gap(&mut self, gap: f64) {
        self.mip_gap = gap.max(0.0);
    }

    fn set_warm_start(&mut self, values: &[(VarId, bool)]) -> Result<(), SolverError> {
        let mut start = vec![false; self.names.len()];
        for &(var, value) in values {
            start[self.check_var(var)?] = value;
        }
        self.warm_start = Some(start);
        Ok(())
    }

    fn solve(&mut self) -> Result<SolveStatus, SolverError> {
        let costs = self.folded_costs()?;
        let deadline = Instant::now() + self.time_limit;
        let active = vec![true; self.rows.len()];
        let mut search = Search::new(
            &self.rows,
            &self.columns,
            &active,
            costs.clone(),
            deadline,
            self.mip_gap,
            false,
        );

        if let Some(start) = self.warm_start.as_ref().filter(|start| self.satisfies(start)) {
            search.offer(Self::objective_of(&costs, start), start.clone());
        }
        search.run();

        let status = if search.timed_out {
            SolveStatus::TimeLimit {
                has_incumbent: search.best.is_some(),
            }
        } else if search.best.is_some() {
            SolveStatus::Optimal
        } else {
            SolveStatus::Infeasible
        };
        debug!(
            nodes = search.nodes,
            variables = self.names.len(),
            constraints = self.rows.len(),
            ?status,
            "branch and bound finished"
        );
        self.nodes = search.nodes;
        self.solution = search.best.map(|(_, values)| values);
        Ok(status)
    }

    fn value(&self, var: VarId) -> Option<bool> {
        self.solution.as_ref()?.get(var.0).copied()
    }

    fn objective_values(&self) -> Vec<i64> {
        let Some(solution) = &self.solution else {
            return Vec::new();
        };
        self.objectives
            .iter()
            .map(|objective| {
                objective
                    .terms
                    .iter()
                    .filter(|(var, _)| solution.get(var.0).copied().unwrap_or(false))
                    .map(|(_, coef)| *coef)
                    .sum()
            })
            .collect()
    }

    fn compute_conflict(&mut self, limit: Duration) -> Result<Vec<String>, SolverError> {
        let deadline = Instant::now() + limit;
        let zero = vec![0i64; self.names.len()];
        let rows = &self.rows;
        let columns = &self.columns;
        let kept = deletion_filter(rows.len(), deadline, |active| {
            let mut search = Search::new(rows, columns, active, zero.clone(), deadline, 0.0, true);
            search.run();
            if search.best.is_some() {
                Some(false)
            } else if search.timed_out {
                None
            } else {
                Some(true)
            }
        });
        Ok(kept.into_iter().map(|row| self.rows[row].name.clone()).collect())
    }
}

/// State of one tree search over the active rows.
struct Search<'m> {
    rows: &'m [Row],
    columns: &'m [Vec<(usize, i64)>],
    active: &'m [bool],
    cost: Vec<i64>,
    reduced: Vec<i128>,
    dual_const: i128,
    /// Disjoint exactly-one rows used by the bound.
    kept: Vec<usize>,
    in_kept: Vec<bool>,
    /// Every active exactly-one row, used for branching.
    choice: Vec<usize>,
    value: Vec<Option<bool>>,
    min_act: Vec<i64>,
    max_act: Vec<i64>,
    trail: Vec<usize>,
    queue: Vec<usize>,
    deadline: Instant,
    gap: f64,
    first_feasible: bool,
    best: Option<(i128, Vec<bool>)>,
    timed_out: bool,
    nodes: u64,
}

impl<'m> Search<'m> {
    fn new(
        rows: &'m [Row],
        columns: &'m [Vec<(usize, i64)>],
        active: &'m [bool],
        cost: Vec<i64>,
        deadline: Instant,
        gap: f64,
        first_feasible: bool,
    ) -> Self {
        let vars = columns.len();
        let mut min_act = vec![0i64; rows.len()];
        let mut max_act = vec![0i64; rows.len()];
        for (index, row) in rows.iter().enumerate() {
            for &(_, coef) in &row.terms {
                min_act[index] += coef.min(0);
                max_act[index] += coef.max(0);
            }
        }

        // dualize equality rows that own a private unit column
        let mut lambda = vec![0i128; rows.len()];
        let mut dualized = vec![false; rows.len()];
        for (index, row) in rows.iter().enumerate() {
            if !active[index] || row.sense != Sense::Eq {
                continue;
            }
            let private = row.terms.iter().find(|&&(var, coef)| {
                coef.abs() == 1
                    && columns[var]
                        .iter()
                        .filter(|(other, _)| active[*other])
                        .count()
                        == 1
            });
            if let Some(&(var, coef)) = private {
                lambda[index] = i128::from(cost[var]) * i128::from(coef);
                dualized[index] = true;
            }
        }
        let reduced: Vec<i128> = (0..vars)
            .map(|var| {
                let dual: i128 = columns[var]
                    .iter()
                    .filter(|(row, _)| active[*row])
                    .map(|&(row, coef)| lambda[row] * i128::from(coef))
                    .sum();
                i128::from(cost[var]) - dual
            })
            .collect();
        let dual_const = rows
            .iter()
            .enumerate()
            .filter(|(index, _)| active[*index])
            .map(|(index, row)| lambda[index] * i128::from(row.rhs))
            .sum();

        let choice: Vec<usize> = (0..rows.len())
            .filter(|&index| active[index] && rows[index].is_choice())
            .collect();
        let mut in_kept = vec![false; vars];
        let mut kept = Vec::new();
        for &index in &choice {
            if dualized[index] || rows[index].terms.iter().any(|(var, _)| in_kept[*var]) {
                continue;
            }
            for &(var, _) in &rows[index].terms {
                in_kept[var] = true;
            }
            kept.push(index);
        }

        Self {
            rows,
            columns,
            active,
            cost,
            reduced,
            dual_const,
            kept,
            in_kept,
            choice,
            value: vec![None; vars],
            min_act,
            max_act,
            trail: Vec::new(),
            queue: (0..rows.len()).filter(|&index| active[index]).collect(),
            deadline,
            gap,
            first_feasible,
            best: None,
            timed_out: false,
            nodes: 0,
        }
    }

    fn offer(&mut self, objective: i128, values: Vec<bool>) {
        if self.best.as_ref().map_or(true, |(best, _)| objective < *best) {
            self.best = Some((objective, values));
        }
    }

    fn run(&mut self) {
        if self.propagate() {
            self.dive();
        }
    }

    fn violated(&self, row: usize) -> bool {
        let Row { sense, rhs, .. } = self.rows[row];
        match sense {
            Sense::Le => self.min_act[row] > rhs,
            Sense::Ge => self.max_act[row] < rhs,
            Sense::Eq => self.min_act[row] > rhs || self.max_act[row] < rhs,
        }
    }

    /// Fix `var`; returns `false` if a row became violated.
    fn fix(&mut self, var: usize, on: bool) -> bool {
        self.value[var] = Some(on);
        self.trail.push(var);
        let mut consistent = true;
        for &(row, coef) in &self.columns[var] {
            if !self.active[row] {
                continue;
            }
            let taken = if on { coef } else { 0 };
            self.min_act[row] += taken - coef.min(0);
            self.max_act[row] += taken - coef.max(0);
            if self.violated(row) {
                consistent = false;
            }
            self.queue.push(row);
        }
        consistent
    }

    fn undo(&mut self, mark: usize) {
        self.queue.clear();
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else {
                break;
            };
            let Some(on) = self.value[var].take() else {
                continue;
            };
            for &(row, coef) in &self.columns[var] {
                if !self.active[row] {
                    continue;
                }
                let taken = if on { coef } else { 0 };
                self.min_act[row] -= taken - coef.min(0);
                self.max_act[row] -= taken - coef.max(0);
            }
        }
    }

    fn propagate(&mut self) -> bool {
        let rows = self.rows;
        while let Some(index) = self.queue.pop() {
            if self.violated(index) {
                self.queue.clear();
                return false;
            }
            let row = &rows[index];
            for &(var, coef) in &row.terms {
                if self.value[var].is_some() {
                    continue;
                }
                let tight_le = matches!(row.sense, Sense::Le | Sense::Eq)
                    && self.min_act[index] + coef.abs() > row.rhs;
                let tight_ge = matches!(row.sense, Sense::Ge | Sense::Eq)
                    && self.max_act[index] - coef.abs() < row.rhs;
                let forced = if tight_le {
                    Some(coef < 0)
                } else if tight_ge {
                    Some(coef > 0)
                } else {
                    None
                };
                if let Some(on) = forced {
                    if !self.fix(var, on) {
                        self.queue.clear();
                        return false;
                    }
                }
            }
        }
        true
    }

    fn bound(&self) -> Option<i128> {
        let mut bound = self.dual_const;
        for (var, value) in self.value.iter().enumerate() {
            match value {
                Some(true) => bound += self.reduced[var],
                Some(false) => {}
                None if !self.in_kept[var] => bound += self.reduced[var].min(0),
                None => {}
            }
        }
        for &index in &self.kept {
            let terms = &self.rows[index].terms;
            if terms.iter().any(|(var, _)| self.value[*var] == Some(true)) {
                continue;
            }
            let cheapest = terms
                .iter()
                .filter(|(var, _)| self.value[*var].is_none())
                .map(|(var, _)| self.reduced[*var])
                .min()?;
            bound += cheapest;
        }
        Some(bound)
    }

    fn pruned(&self, bound: i128) -> bool {
        let Some((best, _)) = &self.best else {
            return false;
        };
        if bound >= *best {
            return true;
        }
        self.gap > 0.0 && ((*best - bound) as f64) <= self.gap * (*best as f64).abs()
    }

    fn done(&self) -> bool {
        self.timed_out || (self.first_feasible && self.best.is_some())
    }

    /// Unsatisfied exactly-one row with the fewest free variables.
    fn branch_row(&self) -> Option<usize> {
        self.choice
            .iter()
            .copied()
            .filter(|&index| {
                !self.rows[index]
                    .terms
                    .iter()
                    .any(|(var, _)| self.value[*var] == Some(true))
            })
            .min_by_key(|&index| {
                self.rows[index]
                    .terms
                    .iter()
                    .filter(|(var, _)| self.value[*var].is_none())
                    .count()
            })
    }

    fn dive(&mut self) {
        if self.done() {
            return;
        }
        self.nodes += 1;
        if Instant::now() >= self.deadline {
            self.timed_out = true;
            return;
        }
        if !self.first_feasible {
            match self.bound() {
                Some(bound) if !self.pruned(bound) => {}
                _ => return,
            }
        }

        if let Some(index) = self.branch_row() {
            let mut candidates: Vec<usize> = self.rows[index]
                .terms
                .iter()
                .map(|(var, _)| *var)
                .filter(|var| self.value[*var].is_none())
                .collect();
            candidates.sort_by_key(|var| (self.reduced[*var], *var));
            for var in candidates {
                self.try_fix(var, true);
                if self.done() {
                    return;
                }
            }
            return;
        }

        match self.value.iter().position(Option::is_none) {
            None => {
                let values: Vec<bool> = self.value.iter().map(|v| v.unwrap_or(false)).collect();
                let objective = BranchAndBound::objective_of(&self.cost, &values);
                self.offer(objective, values);
            }
            Some(var) => {
                let first = self.reduced[var] < 0;
                for on in [first, !first] {
                    self.try_fix(var, on);
                    if self.done() {
                        return;
                    }
                }
            }
        }
    }

    fn try_fix(&mut self, var: usize, on: bool) {
        let mark = self.trail.len();
        if self.fix(var, on) && self.propagate() {
            self.dive();
        }
        self.undo(mark);
    }
}
