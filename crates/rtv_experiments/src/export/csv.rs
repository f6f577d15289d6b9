use std::collections::HashMap;

use rtv_core::config::AssignmentKind;

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

fn assignment_name(kind: AssignmentKind) -> &'static str {
    match kind {
        AssignmentKind::Exact => "exact",
        AssignmentKind::Greedy => "greedy",
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(crate) fn export_to_csv_impl(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    writer: impl std::io::Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let by_run: HashMap<usize, &ParameterSet> =
        parameter_sets.iter().map(|set| (set.run_id, set)).collect();

    let mut wtr = ::csv::Writer::from_writer(writer);

    wtr.write_record([
        "experiment_id",
        "run_id",
        "seed",
        "assignment",
        "num_vehicles",
        "capacity",
        "num_requests",
        "grid_radius",
        "request_window_secs",
        "round_interval_secs",
        "end_secs",
        "max_edges_rv",
        "max_edges_rr",
        "max_trip_size",
        "rtv_timeout_ms",
        "solver_time_limit_ms",
        "total_requests",
        "total_vehicles",
        "completed_requests",
        "denied_requests",
        "open_requests",
        "service_rate",
        "total_delay_secs",
        "avg_delay_secs",
        "rounds",
        "optimal_rounds",
        "incumbent_rounds",
        "greedy_rounds",
        "fallback_rounds",
        "rejections",
        "displacements",
        "disruptions",
        "timed_out_vehicles",
        "avg_visits_per_round",
        "avg_round_ms",
        "median_round_ms",
        "p90_round_ms",
        "max_round_ms",
    ])?;

    for result in results {
        let param_set = by_run
            .get(&result.run_id)
            .ok_or_else(|| format!("No parameter set for run {}", result.run_id))?;
        let params = &param_set.params;
        let config = &param_set.config;

        wtr.write_record([
            param_set.experiment_id.clone(),
            param_set.run_id.to_string(),
            param_set.seed.to_string(),
            assignment_name(config.assignment).to_string(),
            params.num_vehicles.to_string(),
            params.capacity.to_string(),
            params.num_requests.to_string(),
            params.grid_radius.to_string(),
            params.request_window_secs.to_string(),
            params.round_interval_secs.to_string(),
            params.end_secs.to_string(),
            optional(config.max_edges_rv),
            optional(config.max_edges_rr),
            optional(config.max_trip_size),
            config.rtv_timeout_ms.to_string(),
            config.solver_time_limit_ms.to_string(),
            result.total_requests.to_string(),
            result.total_vehicles.to_string(),
            result.completed_requests.to_string(),
            result.denied_requests.to_string(),
            result.open_requests.to_string(),
            result.service_rate.to_string(),
            result.total_delay_secs.to_string(),
            result.avg_delay_secs.to_string(),
            result.rounds.to_string(),
            result.optimal_rounds.to_string(),
            result.incumbent_rounds.to_string(),
            result.greedy_rounds.to_string(),
            result.fallback_rounds.to_string(),
            result.rejections.to_string(),
            result.displacements.to_string(),
            result.disruptions.to_string(),
            result.timed_out_vehicles.to_string(),
            result.avg_visits_per_round.to_string(),
            result.avg_round_ms.to_string(),
            result.median_round_ms.to_string(),
            result.p90_round_ms.to_string(),
            result.max_round_ms.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
