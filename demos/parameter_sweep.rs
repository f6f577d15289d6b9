//! Parameter sweep comparing exact and greedy assignment.
//!
//! Run with: cargo run --release -p rtv_experiments --example parameter_sweep
//!
//! Swap the space in `main` for another from `parameter_spaces`.

use rtv_experiments::parameter_spaces::assignment_comparison_space;
use rtv_experiments::{
    export_to_csv, export_to_json, find_best_parameters, find_best_result_index,
    run_parallel_experiments,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Per-round logs are noisy across hundreds of runs.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rtv_experiments=info".parse()?)
                .add_directive("rtv_core=warn".parse()?),
        )
        .init();

    let parameter_sets = assignment_comparison_space().generate();
    info!(runs = parameter_sets.len(), "generated parameter sets");

    let results = run_parallel_experiments(parameter_sets.clone(), None);
    info!(completed = results.len(), "sweep finished");

    let best_idx = find_best_result_index(&results).ok_or("No results to analyze")?;
    let best = &results[best_idx];
    println!("\n=== Best run ===");
    println!("Service rate: {:.2}%", best.service_rate * 100.0);
    println!("Avg drop-off delay: {:.1}s", best.avg_delay_secs);
    println!("Avg round time: {:.2}ms (p90 {:.2}ms)", best.avg_round_ms, best.p90_round_ms);
    println!("Fallback rounds: {}", best.fallback_rounds);

    if let Some(best_params) = find_best_parameters(&results, &parameter_sets) {
        println!("\n=== Best parameters ===");
        println!("Assignment: {:?}", best_params.config.assignment);
        println!("Vehicles: {}", best_params.params.num_vehicles);
        println!("Capacity: {}", best_params.params.capacity);
        println!("Requests: {}", best_params.params.num_requests);
        println!("Seed: {}", best_params.seed);
    }

    export_to_csv(&results, &parameter_sets, "experiment_results.csv")?;
    export_to_json(&results, "experiment_results.json")?;
    println!("\nExported to experiment_results.csv and experiment_results.json");

    Ok(())
}
