//! Metrics extraction from completed runs.
//!
//! Request outcomes come from the status markers left on request entities,
//! fleet counters from [`FleetTelemetry`], and per-round cost from the
//! [`RoundLog`] the runner fills while stepping the world.

use bevy_ecs::prelude::{With, World};
use rtv_core::ecs::{Completed, Denied, FleetTelemetry, RequestAgent, VehicleAgent};
use rtv_core::matching::AssignmentOutcome;
use rtv_core::round::RoundResult;

/// Per-round observations collected while a run advances.
#[derive(Debug, Clone, Default)]
pub struct RoundLog {
    pub round_micros: Vec<u64>,
    pub visits: Vec<usize>,
    pub optimal_rounds: usize,
    pub incumbent_rounds: usize,
    pub greedy_rounds: usize,
    pub fallback_rounds: usize,
    /// Vehicle enumerations cut short by the RTV timeout, summed over rounds.
    pub timed_out_vehicles: usize,
}

impl RoundLog {
    pub fn record(&mut self, result: &RoundResult) {
        self.round_micros
            .push(u64::try_from(result.durations.total.as_micros()).unwrap_or(u64::MAX));
        self.visits.push(result.stats.visits);
        self.timed_out_vehicles += result.stats.timed_out_vehicles;
        match result.outcome() {
            AssignmentOutcome::Optimal => self.optimal_rounds += 1,
            AssignmentOutcome::Incumbent => self.incumbent_rounds += 1,
            AssignmentOutcome::Greedy => self.greedy_rounds += 1,
            AssignmentOutcome::Fallback => self.fallback_rounds += 1,
        }
    }

    pub fn rounds(&self) -> usize {
        self.round_micros.len()
    }
}

/// Aggregated metrics from a single run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SimulationResult {
    pub experiment_id: String,
    pub run_id: usize,
    pub total_requests: usize,
    pub total_vehicles: usize,
    pub completed_requests: usize,
    /// Requests whose pickup window closed before any vehicle took them.
    pub denied_requests: usize,
    /// Requests still waiting or on board when the schedule ended.
    pub open_requests: usize,
    /// Completed over total requests.
    pub service_rate: f64,
    /// Drop-off lateness over completed requests, in seconds.
    pub total_delay_secs: u64,
    pub avg_delay_secs: f64,
    pub rounds: usize,
    pub optimal_rounds: usize,
    pub incumbent_rounds: usize,
    pub greedy_rounds: usize,
    pub fallback_rounds: usize,
    pub rejections: u64,
    pub displacements: u64,
    pub disruptions: u64,
    pub timed_out_vehicles: usize,
    pub avg_visits_per_round: f64,
    pub avg_round_ms: f64,
    pub median_round_ms: f64,
    pub p90_round_ms: f64,
    pub max_round_ms: f64,
}

impl SimulationResult {
    /// Average, median and P90 of `values`.
    fn calculate_stats(values: &[u64]) -> (f64, f64, f64) {
        if values.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
        } else {
            sorted[mid] as f64
        };
        let p90 = sorted[((sorted.len() - 1) as f64 * 0.9) as usize] as f64;

        (avg, median, p90)
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

fn count_requests<T: bevy_ecs::component::Component>(world: &mut World) -> usize {
    world
        .query_filtered::<(), (With<RequestAgent>, With<T>)>()
        .iter(world)
        .count()
}

/// Reduce a finished world and its round log to a [`SimulationResult`].
pub fn extract_metrics(
    world: &mut World,
    log: &RoundLog,
    experiment_id: &str,
    run_id: usize,
) -> SimulationResult {
    let telemetry = world
        .get_resource::<FleetTelemetry>()
        .cloned()
        .unwrap_or_default();

    let total_requests = world.query::<&RequestAgent>().iter(world).count();
    let total_vehicles = world.query::<&VehicleAgent>().iter(world).count();
    let completed_requests = count_requests::<Completed>(world);
    let denied_requests = count_requests::<Denied>(world);

    let max_us = log.round_micros.iter().copied().max().unwrap_or(0);
    let (avg_us, median_us, p90_us) = SimulationResult::calculate_stats(&log.round_micros);

    SimulationResult {
        experiment_id: experiment_id.to_string(),
        run_id,
        total_requests,
        total_vehicles,
        completed_requests,
        denied_requests,
        open_requests: total_requests.saturating_sub(completed_requests + denied_requests),
        service_rate: ratio(completed_requests as f64, total_requests),
        total_delay_secs: telemetry.total_delay,
        avg_delay_secs: ratio(telemetry.total_delay as f64, completed_requests),
        rounds: log.rounds(),
        optimal_rounds: log.optimal_rounds,
        incumbent_rounds: log.incumbent_rounds,
        greedy_rounds: log.greedy_rounds,
        fallback_rounds: log.fallback_rounds,
        rejections: telemetry.rejections,
        displacements: telemetry.displacements,
        disruptions: telemetry.disruptions,
        timed_out_vehicles: log.timed_out_vehicles,
        avg_visits_per_round: ratio(log.visits.iter().sum::<usize>() as f64, log.rounds()),
        avg_round_ms: avg_us / 1000.0,
        median_round_ms: median_us / 1000.0,
        p90_round_ms: p90_us / 1000.0,
        max_round_ms: max_us as f64 / 1000.0,
    }
}
