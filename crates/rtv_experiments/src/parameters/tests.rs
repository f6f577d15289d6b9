use std::collections::HashSet;

use rtv_core::config::AssignmentKind;

use super::ParameterSpace;

#[test]
fn grid_takes_the_cartesian_product() {
    let sets = ParameterSpace::grid()
        .assignment(vec![AssignmentKind::Greedy, AssignmentKind::Exact])
        .num_vehicles(vec![5, 10])
        .capacity(vec![2, 3, 4])
        .generate();

    assert_eq!(sets.len(), 12);
    let experiments: HashSet<_> = sets.iter().map(|set| set.experiment_id.clone()).collect();
    assert_eq!(experiments.len(), 12);
    for (index, set) in sets.iter().enumerate() {
        assert_eq!(set.run_id, index);
        assert!([2, 3, 4].contains(&set.params.capacity));
        assert!(!set.config.parallel);
    }
}

#[test]
fn unset_dimensions_fall_back_to_the_base() {
    let sets = ParameterSpace::grid().num_requests(vec![50]).generate();

    assert_eq!(sets.len(), 1);
    let set = &sets[0];
    assert_eq!(set.params.num_requests, 50);
    assert_eq!(set.params.num_vehicles, 20);
    assert_eq!(set.config.assignment, AssignmentKind::Exact);
}

#[test]
fn invalid_combinations_are_filtered_out() {
    let sets = ParameterSpace::grid()
        .capacity(vec![0, 2])
        .max_trip_size(vec![Some(0), Some(2), None])
        .generate();

    assert_eq!(sets.len(), 2);
    assert!(sets.iter().all(|set| set.params.capacity == 2));
    assert!(sets.iter().all(|set| set.config.max_trip_size != Some(0)));
}

#[test]
fn replications_share_the_experiment_but_not_the_seed() {
    let sets = ParameterSpace::grid()
        .num_vehicles(vec![4, 8])
        .replications(3)
        .generate();

    assert_eq!(sets.len(), 6);
    assert!(sets[..3].iter().all(|set| set.experiment_id == "exp_0"));
    let seeds: HashSet<u64> = sets.iter().map(|set| set.seed).collect();
    assert_eq!(seeds.len(), 6);
    assert_eq!(sets[2].scenario_params().seed, Some(sets[2].seed));
}

#[test]
fn sampling_is_reproducible_and_unique() {
    let space = ParameterSpace::grid()
        .assignment(vec![AssignmentKind::Greedy, AssignmentKind::Exact])
        .num_vehicles(vec![5, 10, 15])
        .capacity(vec![2, 4]);

    let first = space.sample_random(5, 11);
    let second = space.sample_random(5, 11);
    assert_eq!(first.len(), 5);
    let key = |sets: &[super::ParameterSet]| -> Vec<(AssignmentKind, usize, u32)> {
        sets.iter()
            .map(|set| (set.config.assignment, set.params.num_vehicles, set.params.capacity))
            .collect()
    };
    assert_eq!(key(&first), key(&second));
    let distinct: HashSet<_> = key(&first).into_iter().collect();
    assert_eq!(distinct.len(), 5);
}

#[test]
fn sampling_stops_when_the_space_is_exhausted() {
    let sets = ParameterSpace::grid()
        .capacity(vec![2, 3])
        .sample_random(10, 1);
    assert_eq!(sets.len(), 2);
}
