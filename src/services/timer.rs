//! Question deadlines and deferred round events.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    time::{Duration, Instant},
};

/// Thresholds measured from the moment a question is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Elapsed time after which the first hint is shown.
    pub hint_1: Duration,
    /// Elapsed time after which the second hint is shown.
    pub hint_2: Duration,
    /// Elapsed time after which the question is skipped.
    pub skip: Duration,
}

/// Transition the engine has to run for the open question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Show the hint of the given level.
    Hint(u8),
    /// Give up on the question.
    Skip,
}

impl Deadlines {
    /// Decide what an open question needs at `now`.
    ///
    /// The skip deadline is checked first so an overdue question is never
    /// hinted instead of skipped.
    pub fn evaluate(&self, asked_at: Instant, now: Instant, hints_revealed: u8) -> Option<TimerAction> {
        let elapsed = now.saturating_duration_since(asked_at);
        if elapsed > self.skip {
            Some(TimerAction::Skip)
        } else if hints_revealed == 1 && elapsed > self.hint_2 {
            Some(TimerAction::Hint(2))
        } else if hints_revealed == 0 && elapsed > self.hint_1 {
            Some(TimerAction::Hint(1))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct ScheduledEvent<E> {
    due: Instant,
    seq: u64,
    event: E,
}

impl<E> PartialEq for ScheduledEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<E> Eq for ScheduledEvent<E> {}

impl<E> PartialOrd for ScheduledEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for ScheduledEvent<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.due.cmp(&other.due) {
            Ordering::Equal => self.seq.cmp(&other.seq),
            o => o,
        }
    }
}

/// Queue of events to run at a later instant, popped in due order and then
/// in scheduling order.
#[derive(Debug)]
pub struct Scheduler<E> {
    events: BinaryHeap<Reverse<ScheduledEvent<E>>>,
    seq: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            events: BinaryHeap::new(),
            seq: 0,
        }
    }
}

impl<E> Scheduler<E> {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `event` at `due`.
    pub fn schedule_at(&mut self, due: Instant, event: E) {
        let seq = self.seq;
        self.seq = self.seq.saturating_add(1);
        self.events.push(Reverse(ScheduledEvent { due, seq, event }));
    }

    /// Run `event` once `delay` has elapsed after `now`.
    pub fn schedule_in(&mut self, now: Instant, delay: Duration, event: E) {
        self.schedule_at(now + delay, event);
    }

    /// Pop the earliest event if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<E> {
        if self.events.peek()?.0.due > now {
            return None;
        }
        self.events.pop().map(|Reverse(scheduled)| scheduled.event)
    }

    /// Due instant of the earliest pending event.
    pub fn next_due(&self) -> Option<Instant> {
        self.events.peek().map(|Reverse(scheduled)| scheduled.due)
    }

    /// Abandon every pending event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadlines() -> Deadlines {
        Deadlines {
            hint_1: Duration::from_secs(20),
            hint_2: Duration::from_secs(40),
            skip: Duration::from_secs(60),
        }
    }

    #[test]
    fn nothing_happens_before_the_first_hint() {
        let asked = Instant::now();
        let d = deadlines();
        assert_eq!(d.evaluate(asked, asked + Duration::from_secs(20), 0), None);
    }

    #[test]
    fn hints_follow_their_thresholds() {
        let asked = Instant::now();
        let d = deadlines();
        assert_eq!(
            d.evaluate(asked, asked + Duration::from_secs(21), 0),
            Some(TimerAction::Hint(1))
        );
        assert_eq!(d.evaluate(asked, asked + Duration::from_secs(30), 1), None);
        assert_eq!(
            d.evaluate(asked, asked + Duration::from_secs(41), 1),
            Some(TimerAction::Hint(2))
        );
        assert_eq!(d.evaluate(asked, asked + Duration::from_secs(50), 2), None);
    }

    #[test]
    fn skip_wins_over_pending_hints() {
        let asked = Instant::now();
        let d = deadlines();
        let late = asked + Duration::from_secs(61);
        assert_eq!(d.evaluate(asked, late, 0), Some(TimerAction::Skip));
        assert_eq!(d.evaluate(asked, late, 1), Some(TimerAction::Skip));
        assert_eq!(d.evaluate(asked, late, 2), Some(TimerAction::Skip));
    }

    #[test]
    fn scheduler_pops_in_due_then_insertion_order() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.schedule_in(now, Duration::from_secs(5), "late");
        scheduler.schedule_in(now, Duration::from_secs(1), "first");
        scheduler.schedule_in(now, Duration::from_secs(1), "second");

        assert_eq!(scheduler.pop_due(now), None);
        assert_eq!(scheduler.next_due(), Some(now + Duration::from_secs(1)));

        let later = now + Duration::from_secs(2);
        assert_eq!(scheduler.pop_due(later), Some("first"));
        assert_eq!(scheduler.pop_due(later), Some("second"));
        assert_eq!(scheduler.pop_due(later), None);
        assert_eq!(scheduler.len(), 1);

        scheduler.clear();
        assert!(scheduler.is_empty());
    }
}
