//! Parallel simulation execution using rayon.
//!
//! Every run owns its world, so runs share nothing and parallelize across
//! parameter sets.

use bevy_ecs::prelude::World;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rtv_core::clock::RoundEventKind;
use rtv_core::ecs::LastRoundResult;
use rtv_core::error::ScenarioError;
use rtv_core::profiling::RoundTimings;
use rtv_core::runner::{round_schedule, run_until_empty_with_hook};
use rtv_core::scenario::build_scenario;
use tracing::{debug, info_span, warn};

use crate::metrics::{extract_metrics, RoundLog, SimulationResult};
use crate::parameters::ParameterSet;

/// Upper bound on steps per run; a run normally ends with its schedule.
const MAX_STEPS: usize = 2_000_000;

/// Run one parameter set until its round schedule ends.
pub fn run_single_simulation(param_set: &ParameterSet) -> Result<SimulationResult, ScenarioError> {
    let _span = info_span!(
        "run",
        experiment = %param_set.experiment_id,
        run_id = param_set.run_id,
        seed = param_set.seed
    )
    .entered();

    let mut world = World::new();
    build_scenario(&mut world, param_set.scenario_params(), param_set.config.clone())?;

    let mut schedule = round_schedule();
    let mut log = RoundLog::default();
    let steps = run_until_empty_with_hook(&mut world, &mut schedule, MAX_STEPS, |world, event| {
        if event.kind != RoundEventKind::Assignment {
            return;
        }
        if let Some(result) = world.get_resource::<LastRoundResult>().and_then(|last| last.0.as_ref()) {
            log.record(result);
        }
    });

    if let Some(timings) = world.get_resource::<RoundTimings>() {
        timings.log_summary();
    }
    let result = extract_metrics(&mut world, &log, &param_set.experiment_id, param_set.run_id);
    debug!(
        steps,
        rounds = result.rounds,
        service_rate = result.service_rate,
        avg_delay_secs = result.avg_delay_secs,
        "run finished"
    );
    Ok(result)
}

/// Run multiple simulations in parallel with a progress bar.
///
/// See [`run_parallel_experiments_with_progress`].
pub fn run_parallel_experiments(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
) -> Vec<SimulationResult> {
    run_parallel_experiments_with_progress(parameter_sets, num_threads, true)
}

/// Run multiple simulations in parallel.
///
/// `num_threads` sizes a dedicated rayon pool; `None` uses rayon's default.
/// Results come back in input order. Runs whose scenario cannot be built are
/// logged and left out, so pair results with parameter sets by `run_id`.
pub fn run_parallel_experiments_with_progress(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> Vec<SimulationResult> {
    let total = parameter_sets.len();
    let pb = (show_progress && total > 0).then(|| {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    });

    let run_all = || -> Vec<SimulationResult> {
        parameter_sets
            .par_iter()
            .filter_map(|param_set| {
                let result = run_single_simulation(param_set);
                if let Some(bar) = &pb {
                    bar.inc(1);
                }
                match result {
                    Ok(result) => Some(result),
                    Err(error) => {
                        warn!(
                            experiment = %param_set.experiment_id,
                            run_id = param_set.run_id,
                            %error,
                            "run skipped"
                        );
                        None
                    }
                }
            })
            .collect()
    };

    let results = match num_threads.map(|threads| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
    }) {
        Some(Ok(pool)) => pool.install(run_all),
        Some(Err(error)) => {
            warn!(%error, "failed to build a dedicated thread pool, using the global one");
            run_all()
        }
        None => run_all(),
    };

    if let Some(bar) = &pb {
        bar.finish_with_message("Completed");
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter_spaces::minimal_space;
    use crate::parameters::ParameterSpace;
    use rtv_core::config::AssignmentKind;
    use rtv_core::scenario::ScenarioParams;

    fn small_space() -> ParameterSpace {
        ParameterSpace::grid()
            .with_base(
                ScenarioParams::default()
                    .with_grid_radius(3)
                    .with_requests(12, 120)
                    .with_rounds(30, 600),
            )
            .num_vehicles(vec![3])
            .capacity(vec![2])
    }

    #[test]
    fn test_single_simulation() {
        let sets = small_space().assignment(vec![AssignmentKind::Greedy]).generate();
        let result = run_single_simulation(&sets[0]).expect("run");

        assert_eq!(result.total_requests, 12);
        assert_eq!(result.total_vehicles, 3);
        // Rounds every 30s from 0 through 600.
        assert_eq!(result.rounds, 21);
        assert_eq!(result.greedy_rounds, 21);
        assert!(result.completed_requests > 0);
        assert_eq!(
            result.completed_requests + result.denied_requests + result.open_requests,
            12
        );
    }

    #[test]
    fn invalid_scenario_is_reported() {
        let mut sets = small_space().generate();
        sets[0].params.grid_radius = 0;

        assert!(run_single_simulation(&sets[0]).is_err());
        assert!(run_parallel_experiments_with_progress(sets, Some(1), false).is_empty());
    }

    #[test]
    fn test_parallel_experiments() {
        let sets = minimal_space().generate();
        assert_eq!(sets.len(), 4);
        let results = run_parallel_experiments_with_progress(sets.clone(), Some(2), false);

        assert_eq!(results.len(), 4);
        for (result, set) in results.iter().zip(&sets) {
            assert_eq!(result.run_id, set.run_id);
            assert_eq!(result.total_requests, 20);
            assert!(result.rounds > 0);
        }
        assert!(results.iter().any(|result| result.optimal_rounds + result.incumbent_rounds > 0));
    }
}
