use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{is_valid_combination, run_seed, ParameterCombination, ParameterSet, ParameterSpace, ParameterVariations};

impl ParameterSpace {
    /// Generate random parameter sets (Monte Carlo sampling).
    ///
    /// Draws up to `count` distinct combinations; fewer come back when the
    /// space holds fewer valid combinations.
    pub fn sample_random(&self, count: usize, seed: u64) -> Vec<ParameterSet> {
        const MAX_ATTEMPTS: usize = 10_000;

        let variations = ParameterVariations::from_space(self);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut seen = HashSet::new();
        let mut sets = Vec::new();
        let mut attempts = 0;

        while seen.len() < count && attempts < MAX_ATTEMPTS {
            attempts += 1;
            let Some(combo) = draw(&variations, &mut rng) else {
                break;
            };
            if !is_valid_combination(&combo) || !seen.insert(combo) {
                continue;
            }
            let (params, config) = self.apply(&combo);
            if config.validate().is_err() {
                continue;
            }
            let experiment = seen.len() - 1;
            for replication in 0..self.replications {
                let run_id = sets.len();
                sets.push(ParameterSet::new(
                    params.clone(),
                    config.clone(),
                    format!("sample_{experiment}"),
                    run_id,
                    run_seed(experiment, replication),
                ));
            }
        }
        sets
    }
}

fn draw(variations: &ParameterVariations, rng: &mut StdRng) -> Option<ParameterCombination> {
    Some(ParameterCombination {
        assignment: *variations.assignments.choose(rng)?,
        num_vehicles: *variations.num_vehicles.choose(rng)?,
        capacity: *variations.capacities.choose(rng)?,
        num_requests: *variations.num_requests.choose(rng)?,
        max_edges_rv: *variations.max_edges_rv.choose(rng)?,
        max_trip_size: *variations.max_trip_sizes.choose(rng)?,
        round_interval_secs: *variations.round_intervals.choose(rng)?,
    })
}
