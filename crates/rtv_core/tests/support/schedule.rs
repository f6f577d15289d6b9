#![allow(dead_code)]

use bevy_ecs::prelude::World;
use bevy_ecs::schedule::Schedule;
use rtv_core::clock::{RoundEvent, RoundEventKind};
use rtv_core::runner::{round_schedule, run_next_event_with_hook};

/// Guards against a schedule that keeps re-queueing itself.
const MAX_EVENTS: usize = 100_000;

/// Steps a world through its round schedule and remembers every event it ran.
pub struct RoundDriver {
    schedule: Schedule,
    pub events: Vec<RoundEvent>,
}

impl RoundDriver {
    pub fn new() -> Self {
        Self {
            schedule: round_schedule(),
            events: Vec::new(),
        }
    }

    /// Process the next queued event; `None` once the queue is drained or
    /// past the schedule end.
    pub fn step(&mut self, world: &mut World) -> Option<RoundEventKind> {
        let mut ran = None;
        run_next_event_with_hook(world, &mut self.schedule, |_, event| ran = Some(*event));
        let event = ran?;
        self.events.push(event);
        Some(event.kind)
    }

    /// Process events until none is left, returning how many ran in this call.
    pub fn drain(&mut self, world: &mut World) -> usize {
        let mut processed = 0;
        while processed < MAX_EVENTS && self.step(world).is_some() {
            processed += 1;
        }
        processed
    }

    /// Assignment rounds processed so far.
    pub fn rounds(&self) -> usize {
        self.events
            .iter()
            .filter(|event| event.kind == RoundEventKind::Assignment)
            .count()
    }
}
