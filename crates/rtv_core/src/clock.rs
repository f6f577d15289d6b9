use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::Resource;

use crate::model::Seconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoundEventKind {
    /// Execute visits up to the event time.
    Progress,
    /// Run one assignment round.
    Assignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundEvent {
    pub at: Seconds,
    pub kind: RoundEventKind,
}

impl Ord for RoundEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by time; progress
        // runs before assignment at the same instant.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.kind.cmp(&self.kind))
    }
}

impl PartialOrd for RoundEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Event being processed by the current schedule run.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentRound(pub RoundEvent);

#[derive(Debug, Default, Resource)]
pub struct RoundClock {
    now: Seconds,
    events: BinaryHeap<RoundEvent>,
}

impl RoundClock {
    pub fn now(&self) -> Seconds {
        self.now
    }

    pub fn schedule(&mut self, event: RoundEvent) {
        debug_assert!(event.at >= self.now, "event time must be >= current time");
        self.events.push(event);
    }

    pub fn schedule_at(&mut self, at: Seconds, kind: RoundEventKind) {
        self.schedule(RoundEvent { at, kind });
    }

    pub fn schedule_in(&mut self, secs: Seconds, kind: RoundEventKind) {
        self.schedule_at(self.now.saturating_add(secs), kind);
    }

    pub fn next_event_time(&self) -> Option<Seconds> {
        self.events.peek().map(|event| event.at)
    }

    pub fn pop_next(&mut self) -> Option<RoundEvent> {
        let event = self.events.pop()?;
        self.now = event.at;
        Some(event)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = RoundClock::default();
        clock.schedule_at(60, RoundEventKind::Assignment);
        clock.schedule_at(30, RoundEventKind::Assignment);
        clock.schedule_at(60, RoundEventKind::Progress);

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.at, 30);
        assert_eq!(clock.now(), 30);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.kind, RoundEventKind::Progress);
        assert_eq!(clock.next_event_time(), Some(60));

        let third = clock.pop_next().expect("third event");
        assert_eq!(third.kind, RoundEventKind::Assignment);
        assert_eq!(clock.now(), 60);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }
}
