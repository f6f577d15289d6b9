//! Round profiling: per-phase durations of a single round and their
//! aggregation over a run.

use std::collections::HashMap;
use std::time::Duration;

use bevy_ecs::prelude::Resource;
use serde::Serialize;
use tracing::info;

/// Wall-clock time spent in each phase of one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseDurations {
    pub validation: Duration,
    pub rv: Duration,
    pub rtv: Duration,
    pub assignment: Duration,
    pub total: Duration,
}

impl PhaseDurations {
    pub fn graph_and_assignment(&self) -> Duration {
        self.rv + self.rtv + self.assignment
    }

    /// Phases by name, in execution order.
    pub fn phases(&self) -> [(&'static str, Duration); 4] {
        [
            ("validation", self.validation),
            ("rv", self.rv),
            ("rtv", self.rtv),
            ("assignment", self.assignment),
        ]
    }
}

/// Per-phase timing metrics.
#[derive(Debug, Clone, Default)]
pub struct PhaseTiming {
    /// Total time spent in this phase (cumulative).
    pub total_duration: Duration,
    pub call_count: u64,
    pub min_duration: Duration,
    pub max_duration: Duration,
}

impl PhaseTiming {
    pub fn record(&mut self, duration: Duration) {
        self.total_duration += duration;
        self.call_count += 1;
        if duration < self.min_duration || self.call_count == 1 {
            self.min_duration = duration;
        }
        if duration > self.max_duration {
            self.max_duration = duration;
        }
    }

    pub fn avg_duration(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            let avg_nanos = self.total_duration.as_nanos() / u128::from(self.call_count);
            Duration::from_nanos(u64::try_from(avg_nanos).unwrap_or(u64::MAX))
        }
    }
}

/// Phase timings aggregated over every round of a run.
#[derive(Debug, Default, Resource)]
pub struct RoundTimings {
    timings: HashMap<String, PhaseTiming>,
    rounds: u64,
}

impl RoundTimings {
    pub fn record(&mut self, phase: &str, duration: Duration) {
        self.timings
            .entry(phase.to_string())
            .or_default()
            .record(duration);
    }

    /// Record every phase of one round plus its total.
    pub fn record_round(&mut self, durations: &PhaseDurations) {
        for (phase, duration) in durations.phases() {
            self.record(phase, duration);
        }
        self.record("round", durations.total);
        self.rounds += 1;
    }

    pub fn get(&self, phase: &str) -> Option<&PhaseTiming> {
        self.timings.get(phase)
    }

    pub fn all(&self) -> &HashMap<String, PhaseTiming> {
        &self.timings
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Log one line per phase, most expensive first.
    pub fn log_summary(&self) {
        let mut entries: Vec<_> = self.timings.iter().collect();
        entries.sort_by(|a, b| b.1.total_duration.cmp(&a.1.total_duration));
        for (phase, timing) in entries {
            info!(
                phase = phase.as_str(),
                calls = timing.call_count,
                total_ms = timing.total_duration.as_secs_f64() * 1000.0,
                avg_ms = timing.avg_duration().as_secs_f64() * 1000.0,
                min_ms = timing.min_duration.as_secs_f64() * 1000.0,
                max_ms = timing.max_duration.as_secs_f64() * 1000.0,
                "phase timing"
            );
        }
    }
}
