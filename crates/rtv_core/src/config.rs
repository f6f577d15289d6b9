use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which assignment optimizer a round uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// 0/1 program solved to optimality (or best incumbent within the time limit).
    #[default]
    Exact,
    /// Two-pass greedy selection.
    Greedy,
}

/// Tuning knobs for one decision round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub assignment: AssignmentKind,
    /// Keep at most this many vehicle edges per request (hiring edge excluded).
    pub max_edges_rv: Option<usize>,
    /// Keep at most this many request-request edges per request.
    pub max_edges_rr: Option<usize>,
    /// Soft wall-clock budget for one vehicle's trip enumeration, in milliseconds.
    pub rtv_timeout_ms: u64,
    /// Largest trip enumerated; vehicle capacity applies when unset.
    pub max_trip_size: Option<usize>,
    /// Wall-clock limit for the exact solver, in milliseconds.
    pub solver_time_limit_ms: u64,
    /// Relative optimality gap accepted by the exact solver.
    pub mip_gap: f64,
    /// Wall-clock limit for conflict analysis after an infeasible model.
    pub conflict_time_limit_ms: u64,
    /// Run the RV and RTV phases on the rayon pool.
    pub parallel: bool,
    /// Seed the exact solver with the greedy solution.
    pub warm_start: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            assignment: AssignmentKind::Exact,
            max_edges_rv: Some(30),
            max_edges_rr: Some(30),
            rtv_timeout_ms: 200,
            max_trip_size: None,
            solver_time_limit_ms: 2_000,
            mip_gap: 1e-4,
            conflict_time_limit_ms: 1_000,
            parallel: true,
            warm_start: true,
        }
    }
}

impl MatchingConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.mip_gap) {
            return Err(ConfigError::Invalid(format!(
                "mip_gap must be in [0, 1), got {}",
                self.mip_gap
            )));
        }
        if self.max_trip_size == Some(0) {
            return Err(ConfigError::Invalid("max_trip_size must be positive".into()));
        }
        if self.max_edges_rv == Some(0) {
            return Err(ConfigError::Invalid("max_edges_rv must be positive".into()));
        }
        Ok(())
    }

    pub fn rtv_timeout(&self) -> Duration {
        Duration::from_millis(self.rtv_timeout_ms)
    }

    pub fn solver_time_limit(&self) -> Duration {
        Duration::from_millis(self.solver_time_limit_ms)
    }

    pub fn conflict_time_limit(&self) -> Duration {
        Duration::from_millis(self.conflict_time_limit_ms)
    }

    pub fn with_assignment(mut self, assignment: AssignmentKind) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn with_edge_caps(mut self, max_edges_rv: Option<usize>, max_edges_rr: Option<usize>) -> Self {
        self.max_edges_rv = max_edges_rv;
        self.max_edges_rr = max_edges_rr;
        self
    }

    pub fn with_rtv_timeout_ms(mut self, ms: u64) -> Self {
        self.rtv_timeout_ms = ms;
        self
    }

    pub fn with_max_trip_size(mut self, size: usize) -> Self {
        self.max_trip_size = Some(size);
        self
    }

    pub fn with_solver_time_limit_ms(mut self, ms: u64) -> Self {
        self.solver_time_limit_ms = ms;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }
}
