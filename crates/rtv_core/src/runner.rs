//! Round runner: advances the clock and routes round events into the ECS.
//!
//! Each step pops the next event from [RoundClock], inserts it as
//! [CurrentRound], then runs the schedule. Progress events move vehicles
//! along their visits, assignment events run a decision round and queue the
//! next one.

use bevy_ecs::prelude::Res;
use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};

use crate::clock::{CurrentRound, RoundClock, RoundEvent, RoundEventKind};
use crate::ecs::RoundSchedule;
use crate::systems::{
    assignment_round::assignment_round_system, next_round::next_round_system,
    visit_progress::visit_progress_system,
};

fn is_progress(event: Option<Res<CurrentRound>>) -> bool {
    event
        .map(|e| e.0.kind == RoundEventKind::Progress)
        .unwrap_or(false)
}

fn is_assignment(event: Option<Res<CurrentRound>>) -> bool {
    event
        .map(|e| e.0.kind == RoundEventKind::Assignment)
        .unwrap_or(false)
}

/// Runs one step: pops the next event, inserts it as [CurrentRound], then runs the schedule.
/// Returns `false` if the clock was empty or the next event is past
/// [RoundSchedule::end_secs] (when that resource is present).
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    run_next_event_with_hook(world, schedule, |_, _| {})
}

/// Runs one step and invokes `hook` after the schedule completes.
pub fn run_next_event_with_hook<F>(world: &mut World, schedule: &mut Schedule, mut hook: F) -> bool
where
    F: FnMut(&World, &RoundEvent),
{
    let stop_at = world.get_resource::<RoundSchedule>().map(|s| s.end_secs);
    let next_at = world
        .get_resource::<RoundClock>()
        .and_then(|c| c.next_event_time());
    if let (Some(end), Some(at)) = (stop_at, next_at) {
        if at > end {
            return false;
        }
    }

    let event = match world.get_resource_mut::<RoundClock>().and_then(|mut c| c.pop_next()) {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentRound(event));

    schedule.run(world);
    hook(world, &event);
    true
}

/// Runs steps until the event queue is empty or `max_steps` is reached.
/// Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    run_until_empty_with_hook(world, schedule, max_steps, |_, _| {})
}

/// Runs steps until empty and invokes `hook` after each step.
pub fn run_until_empty_with_hook<F>(
    world: &mut World,
    schedule: &mut Schedule,
    max_steps: usize,
    mut hook: F,
) -> usize
where
    F: FnMut(&World, &RoundEvent),
{
    let mut steps = 0;
    while steps < max_steps && run_next_event_with_hook(world, schedule, &mut hook) {
        steps += 1;
    }
    steps
}

/// Builds the round schedule. Progress runs before the assignment round at
/// the same instant, so a round always sees the fleet as of its start time.
pub fn round_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            visit_progress_system.run_if(is_progress),
            apply_deferred,
            assignment_round_system.run_if(is_assignment),
            next_round_system.run_if(is_assignment),
            apply_deferred,
        )
            .chain(),
    );
    schedule
}

/// Queue the first progress step and round at `start`.
/// Call this after building the scenario and before running events.
pub fn initialize_rounds(world: &mut World, start: u32) {
    let mut clock = world.resource_mut::<RoundClock>();
    clock.schedule_at(start, RoundEventKind::Progress);
    clock.schedule_at(start, RoundEventKind::Assignment);
}
