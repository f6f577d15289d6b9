//! Pre-defined parameter spaces.

use rtv_core::config::AssignmentKind;
use rtv_core::scenario::ScenarioParams;

use crate::ParameterSpace;

/// Exact against greedy on the same instances.
pub fn assignment_comparison_space() -> ParameterSpace {
    ParameterSpace::grid()
        .assignment(vec![AssignmentKind::Greedy, AssignmentKind::Exact])
        .num_vehicles(vec![10, 20, 30])
        .num_requests(vec![150, 300])
        .replications(3)
}

/// Fleet size against vehicle capacity at a fixed demand.
pub fn fleet_capacity_space() -> ParameterSpace {
    ParameterSpace::grid()
        .assignment(vec![AssignmentKind::Greedy])
        .num_vehicles(vec![5, 10, 20, 40])
        .capacity(vec![1, 2, 4, 6])
        .num_requests(vec![300])
        .replications(2)
}

/// How much graph pruning and trip-size limits cost in service.
pub fn pruning_space() -> ParameterSpace {
    ParameterSpace::grid()
        .num_vehicles(vec![20])
        .capacity(vec![4])
        .max_edges_rv(vec![Some(5), Some(15), Some(30), None])
        .max_trip_size(vec![Some(2), Some(3), None])
}

/// Longer rounds batch more requests per decision.
pub fn round_interval_space() -> ParameterSpace {
    ParameterSpace::grid()
        .assignment(vec![AssignmentKind::Greedy, AssignmentKind::Exact])
        .round_interval_secs(vec![10, 30, 60, 120])
}

/// Small, fast space for smoke runs.
pub fn minimal_space() -> ParameterSpace {
    let base = ScenarioParams::default()
        .with_grid_radius(3)
        .with_requests(20, 300)
        .with_rounds(30, 900);
    ParameterSpace::grid()
        .with_base(base)
        .assignment(vec![AssignmentKind::Greedy, AssignmentKind::Exact])
        .num_vehicles(vec![3, 6])
        .capacity(vec![2])
}
