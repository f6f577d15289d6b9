//! Parameter variation framework for exploring the scenario and matching
//! parameter space.
//!
//! A [`ParameterSpace`] lists candidate values per dimension; unset dimensions
//! fall back to the base [`ScenarioParams`] and [`MatchingConfig`]. Grid search
//! takes the Cartesian product, random sampling draws unique combinations.

use rtv_core::config::{AssignmentKind, MatchingConfig};
use rtv_core::scenario::ScenarioParams;

#[path = "parameters/sampling.rs"]
mod sampling;
#[cfg(test)]
#[path = "parameters/tests.rs"]
mod tests;

/// One point of the space, before seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ParameterCombination {
    assignment: AssignmentKind,
    num_vehicles: usize,
    capacity: u32,
    num_requests: usize,
    max_edges_rv: Option<usize>,
    max_trip_size: Option<usize>,
    round_interval_secs: u32,
}

/// Candidate values per dimension with the base values filled in.
struct ParameterVariations {
    assignments: Vec<AssignmentKind>,
    num_vehicles: Vec<usize>,
    capacities: Vec<u32>,
    num_requests: Vec<usize>,
    max_edges_rv: Vec<Option<usize>>,
    max_trip_sizes: Vec<Option<usize>>,
    round_intervals: Vec<u32>,
}

fn or_base<T: Clone>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParameterVariations {
    fn from_space(space: &ParameterSpace) -> Self {
        Self {
            assignments: or_base(&space.assignments, space.base_config.assignment),
            num_vehicles: or_base(&space.num_vehicles, space.base.num_vehicles),
            capacities: or_base(&space.capacities, space.base.capacity),
            num_requests: or_base(&space.num_requests, space.base.num_requests),
            max_edges_rv: or_base(&space.max_edges_rv, space.base_config.max_edges_rv),
            max_trip_sizes: or_base(&space.max_trip_sizes, space.base_config.max_trip_size),
            round_intervals: or_base(&space.round_intervals, space.base.round_interval_secs),
        }
    }

    fn combinations(&self) -> Vec<ParameterCombination> {
        let mut combos = Vec::new();
        for &assignment in &self.assignments {
            for &num_vehicles in &self.num_vehicles {
                for &capacity in &self.capacities {
                    for &num_requests in &self.num_requests {
                        for &max_edges_rv in &self.max_edges_rv {
                            for &max_trip_size in &self.max_trip_sizes {
                                for &round_interval_secs in &self.round_intervals {
                                    combos.push(ParameterCombination {
                                        assignment,
                                        num_vehicles,
                                        capacity,
                                        num_requests,
                                        max_edges_rv,
                                        max_trip_size,
                                        round_interval_secs,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        combos
    }
}

/// A single configuration for one simulation run.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    pub params: ScenarioParams,
    pub config: MatchingConfig,
    /// Identifies the parameter combination; replications share it.
    pub experiment_id: String,
    /// Unique across a sweep.
    pub run_id: usize,
    pub seed: u64,
}

impl ParameterSet {
    pub fn new(
        params: ScenarioParams,
        config: MatchingConfig,
        experiment_id: String,
        run_id: usize,
        seed: u64,
    ) -> Self {
        Self {
            params,
            config,
            experiment_id,
            run_id,
            seed,
        }
    }

    /// Scenario params with the run's seed applied.
    pub fn scenario_params(&self) -> ScenarioParams {
        let mut params = self.params.clone();
        params.seed = Some(self.seed);
        params
    }
}

/// Defines a parameter space for exploration.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    base: ScenarioParams,
    base_config: MatchingConfig,
    assignments: Vec<AssignmentKind>,
    num_vehicles: Vec<usize>,
    capacities: Vec<u32>,
    num_requests: Vec<usize>,
    max_edges_rv: Vec<Option<usize>>,
    max_trip_sizes: Vec<Option<usize>>,
    round_intervals: Vec<u32>,
    /// Seeded runs per combination.
    replications: usize,
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSpace {
    /// Runs already execute in parallel, so the base config keeps each round
    /// on its own thread.
    pub fn new() -> Self {
        Self {
            base: ScenarioParams::default(),
            base_config: MatchingConfig::default().with_parallel(false),
            assignments: vec![],
            num_vehicles: vec![],
            capacities: vec![],
            num_requests: vec![],
            max_edges_rv: vec![],
            max_trip_sizes: vec![],
            round_intervals: vec![],
            replications: 1,
        }
    }

    pub fn grid() -> Self {
        Self::new()
    }

    pub fn assignment(mut self, kinds: Vec<AssignmentKind>) -> Self {
        self.assignments = kinds;
        self
    }

    pub fn num_vehicles(mut self, counts: Vec<usize>) -> Self {
        self.num_vehicles = counts;
        self
    }

    pub fn capacity(mut self, capacities: Vec<u32>) -> Self {
        self.capacities = capacities;
        self
    }

    pub fn num_requests(mut self, counts: Vec<usize>) -> Self {
        self.num_requests = counts;
        self
    }

    pub fn max_edges_rv(mut self, caps: Vec<Option<usize>>) -> Self {
        self.max_edges_rv = caps;
        self
    }

    pub fn max_trip_size(mut self, sizes: Vec<Option<usize>>) -> Self {
        self.max_trip_sizes = sizes;
        self
    }

    pub fn round_interval_secs(mut self, intervals: Vec<u32>) -> Self {
        self.round_intervals = intervals;
        self
    }

    pub fn replications(mut self, count: usize) -> Self {
        self.replications = count.max(1);
        self
    }

    pub fn with_base(mut self, base: ScenarioParams) -> Self {
        self.base = base;
        self
    }

    pub fn with_base_config(mut self, config: MatchingConfig) -> Self {
        self.base_config = config;
        self
    }

    fn apply(&self, combo: &ParameterCombination) -> (ScenarioParams, MatchingConfig) {
        let params = self
            .base
            .clone()
            .with_fleet(combo.num_vehicles, combo.capacity)
            .with_requests(combo.num_requests, self.base.request_window_secs)
            .with_rounds(combo.round_interval_secs, self.base.end_secs);
        let mut config = self.base_config.clone().with_assignment(combo.assignment);
        config.max_edges_rv = combo.max_edges_rv;
        config.max_trip_size = combo.max_trip_size;
        (params, config)
    }

    /// Generate every valid combination (Cartesian product), `replications`
    /// seeded runs each. Combinations that fail validation are skipped.
    pub fn generate(&self) -> Vec<ParameterSet> {
        let variations = ParameterVariations::from_space(self);
        let mut sets = Vec::new();
        for (experiment, combo) in variations
            .combinations()
            .into_iter()
            .filter(is_valid_combination)
            .enumerate()
        {
            let (params, config) = self.apply(&combo);
            if config.validate().is_err() {
                continue;
            }
            for replication in 0..self.replications {
                let run_id = sets.len();
                sets.push(ParameterSet::new(
                    params.clone(),
                    config.clone(),
                    format!("exp_{experiment}"),
                    run_id,
                    run_seed(experiment, replication),
                ));
            }
        }
        sets
    }
}

fn is_valid_combination(combo: &ParameterCombination) -> bool {
    combo.capacity > 0 && combo.num_vehicles > 0 && combo.round_interval_secs > 0
}

/// Distinct, reproducible seed per experiment and replication.
fn run_seed(experiment: usize, replication: usize) -> u64 {
    (experiment as u64)
        .wrapping_mul(0x9e37_79b9)
        .wrapping_add((replication as u64).wrapping_mul(0x85eb_ca6b))
}
