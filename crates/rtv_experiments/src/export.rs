//! Result export and ranking.
//!
//! Results export to JSON on their own or to CSV joined with the parameters
//! that produced them. Ranking picks the run that served the most requests,
//! then the one with the least delay.

use std::path::Path;

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/ranking.rs"]
mod ranking;
#[path = "export/output.rs"]
mod output;

/// Export results to a pretty-printed JSON array.
pub fn export_to_json(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let writer = output::open_export(path)?;
    json::write_results_json(results, writer)
}

/// Export results with their parameters to CSV, one row per run.
///
/// Rows are joined on `run_id`, so a sweep that skipped failed runs still
/// lines up.
///
/// # Errors
///
/// Fails on empty input, on a result without a matching parameter set, or on
/// any I/O or CSV error.
pub fn export_to_csv(
    results: &[SimulationResult],
    parameter_sets: &[ParameterSet],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    output::require_results(results)?;
    let writer = output::open_export(path)?;
    csv::export_to_csv_impl(results, parameter_sets, writer)
}

/// Parameter set of the best run, if any.
pub fn find_best_parameters<'a>(
    results: &[SimulationResult],
    parameter_sets: &'a [ParameterSet],
) -> Option<&'a ParameterSet> {
    ranking::find_best_parameters_impl(results, parameter_sets)
}

/// Index of the best run: highest service rate, then lowest average delay,
/// then lowest average round time.
pub fn find_best_result_index(results: &[SimulationResult]) -> Option<usize> {
    ranking::find_best_index(results)
}
