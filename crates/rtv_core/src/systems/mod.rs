pub mod assignment_round;
pub mod next_round;
pub mod visit_progress;
