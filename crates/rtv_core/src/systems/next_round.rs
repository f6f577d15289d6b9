use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{CurrentRound, RoundClock, RoundEventKind};
use crate::ecs::RoundSchedule;

/// After each assignment round, queue the next progress step and round one
/// interval later, until the schedule ends.
pub fn next_round_system(
    event: Res<CurrentRound>,
    schedule: Res<RoundSchedule>,
    mut clock: ResMut<RoundClock>,
) {
    if event.0.kind != RoundEventKind::Assignment || schedule.interval_secs == 0 {
        return;
    }
    let next = event.0.at.saturating_add(schedule.interval_secs);
    if next > schedule.end_secs {
        return;
    }
    clock.schedule_at(next, RoundEventKind::Progress);
    clock.schedule_at(next, RoundEventKind::Assignment);
}
