//! One-shot timers ordered by deadline.
//!
//! Pure data-structure logic: a deadline-ordered queue of one-shot entries.
//! The reactor pops expired entries before invoking them, so a callback can
//! re-register freely.

use crate::failure::Failure;
use crate::reactor::core::Reactor;

use std::collections::VecDeque;
use std::time::Instant;

pub(crate) type TimerCallback = Box<dyn FnOnce(&mut Reactor) -> Result<(), Failure>>;

/// Token identifying a registered timer, usable with `remove_timer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,
    token: u64,
    pub(crate) callback: TimerCallback,
}

pub(crate) struct Timers {
    // non-decreasing deadline; insertion keeps registration order among
    // equal deadlines
    entries: VecDeque<TimerEntry>,
    next_token: u64,
}

impl Timers {
    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_token: 0,
        }
    }

    pub(crate) fn add(&mut self, deadline: Instant, callback: TimerCallback) -> TimerToken {
        let token = self.next_token;
        self.next_token += 1;

        let at = self.entries.partition_point(|entry| entry.deadline <= deadline);
        self.entries.insert(
            at,
            TimerEntry {
                deadline,
                token,
                callback,
            },
        );
        TimerToken(token)
    }

    pub(crate) fn remove(&mut self, token: TimerToken) -> bool {
        if let Some(position) = self.entries.iter().position(|entry| entry.token == token.0) {
            self.entries.remove(position);
            return true;
        }
        false
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.front().map(|entry| entry.deadline)
    }

    /// Removes and returns the front entry if its deadline has passed.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Option<TimerEntry> {
        if self.entries.front().is_some_and(|entry| entry.deadline <= now) {
            return self.entries.pop_front();
        }
        None
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
