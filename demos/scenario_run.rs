//! Run one generated scenario through the round loop and print fleet counters.
//!
//! Run with: cargo run -p rtv_core --example scenario_run [-- matching.json]
//!
//! The optional argument is a JSON `MatchingConfig`; missing fields keep their
//! defaults. Set `RUST_LOG=rtv_core=debug` for per-round logs.

use bevy_ecs::prelude::World;
use rtv_core::config::MatchingConfig;
use rtv_core::ecs::FleetTelemetry;
use rtv_core::profiling::RoundTimings;
use rtv_core::runner::{round_schedule, run_until_empty};
use rtv_core::scenario::{build_scenario, ScenarioParams};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rtv_core=info".parse()?))
        .init();

    const NUM_VEHICLES: usize = 30;
    const NUM_REQUESTS: usize = 400;

    let config = match std::env::args().nth(1) {
        Some(path) => MatchingConfig::from_path(path)?,
        None => MatchingConfig::default(),
    };
    let params = ScenarioParams::default()
        .with_seed(123)
        .with_fleet(NUM_VEHICLES, 4)
        .with_requests(NUM_REQUESTS, 1_800)
        .with_rounds(30, 3_600);

    let mut world = World::new();
    build_scenario(&mut world, params, config)?;

    let mut schedule = round_schedule();
    let steps = run_until_empty(&mut world, &mut schedule, 2_000_000);

    let telemetry = world.resource::<FleetTelemetry>();
    println!("--- Scenario run ({NUM_REQUESTS} requests, {NUM_VEHICLES} vehicles, seed 123) ---");
    println!("Steps executed: {steps}");
    println!("Rounds: {} ({} fell back)", telemetry.rounds, telemetry.fallback_rounds);
    println!("Picked up: {}, delivered: {}", telemetry.pickups, telemetry.dropoffs);
    println!("Denied: {}", telemetry.denied);
    if telemetry.dropoffs > 0 {
        println!(
            "Average drop-off delay: {:.1} s",
            telemetry.total_delay as f64 / telemetry.dropoffs as f64
        );
    }

    world.resource::<RoundTimings>().log_summary();
    Ok(())
}
