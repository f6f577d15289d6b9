use std::time::Instant;

/// Deletion filter over `rows` constraints.
///
/// `infeasible(active)` answers whether the constraints flagged in `active`
/// cannot hold together: `Some(true)` infeasible, `Some(false)` feasible,
/// `None` unknown (the check ran out of time). Each row is dropped in turn and
/// stays dropped while the rest remains infeasible, so the rows left at the
/// end form an irreducible conflicting set. Rows whose check is unknown, or
/// that were not reached before `deadline`, are kept.
pub fn deletion_filter(
    rows: usize,
    deadline: Instant,
    mut infeasible: impl FnMut(&[bool]) -> Option<bool>,
) -> Vec<usize> {
    let mut active = vec![true; rows];
    for row in 0..rows {
        if Instant::now() >= deadline {
            break;
        }
        active[row] = false;
        if infeasible(&active) != Some(true) {
            active[row] = true;
        }
    }
    active
        .iter()
        .enumerate()
        .filter_map(|(row, kept)| kept.then_some(row))
        .collect()
}
