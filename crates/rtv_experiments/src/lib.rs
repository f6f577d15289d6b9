//! Parallel parameter sweeps over synthetic ride-sharing instances.
//!
//! Each parameter set generates a scenario, runs it through the round-based
//! ECS loop of `rtv_core` until the schedule ends, and reduces the world to a
//! [`SimulationResult`]. Sweeps run in parallel on rayon and export to CSV or
//! JSON.
//!
//! # Quick Start
//!
//! ```no_run
//! use rtv_core::config::AssignmentKind;
//! use rtv_experiments::{export_to_csv, find_best_result_index, run_parallel_experiments, ParameterSpace};
//!
//! let space = ParameterSpace::grid()
//!     .assignment(vec![AssignmentKind::Greedy, AssignmentKind::Exact])
//!     .num_vehicles(vec![10, 20])
//!     .capacity(vec![2, 4]);
//!
//! let parameter_sets = space.generate();
//! let results = run_parallel_experiments(parameter_sets.clone(), None);
//! let best = find_best_result_index(&results);
//! export_to_csv(&results, &parameter_sets, "sweep.csv").unwrap();
//! ```
//!
//! # Modules
//!
//! - [`parameters`]: grid search and random sampling over scenario and matching knobs
//! - [`parameter_spaces`]: ready-made spaces
//! - [`runner`]: single and parallel runs
//! - [`metrics`]: per-run service, delay and round-time metrics
//! - [`export`]: CSV/JSON export and ranking

pub mod export;
pub mod metrics;
pub mod parameter_spaces;
pub mod parameters;
pub mod runner;

pub use export::{export_to_csv, export_to_json, find_best_parameters, find_best_result_index};
pub use metrics::SimulationResult;
pub use parameters::{ParameterSet, ParameterSpace};
pub use runner::run_parallel_experiments;
