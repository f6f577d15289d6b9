use std::cmp::Ordering;

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

fn rank(a: &SimulationResult, b: &SimulationResult) -> Ordering {
    a.service_rate
        .total_cmp(&b.service_rate)
        .then_with(|| b.avg_delay_secs.total_cmp(&a.avg_delay_secs))
        .then_with(|| b.avg_round_ms.total_cmp(&a.avg_round_ms))
}

pub(crate) fn find_best_index(results: &[SimulationResult]) -> Option<usize> {
    results
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| rank(a, b))
        .map(|(index, _)| index)
}

pub(crate) fn find_best_parameters_impl<'a>(
    results: &[SimulationResult],
    parameter_sets: &'a [ParameterSet],
) -> Option<&'a ParameterSet> {
    let best = &results[find_best_index(results)?];
    parameter_sets.iter().find(|set| set.run_id == best.run_id)
}
