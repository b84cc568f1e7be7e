// src/timer.rs

//! One-shot deferred callbacks for the event loop.
//!
//! The loop asks for the time until the next deadline, waits at most that
//! long for I/O, then drains whatever has expired. Entries can be cancelled
//! individually or all at once on teardown.

use log::trace;
use std::time::{Duration, Instant};

/// Handle for cancelling a scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    deadline: Instant,
    id: TimerId,
    payload: T,
}

/// Deadline-ordered queue of payloads.
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration, payload: T) -> TimerId {
        let deadline = now + delay;
        let id = TimerId(self.next_id);
        self.next_id += 1;
        // Equal deadlines keep scheduling order.
        let pos = self.entries.partition_point(|e| e.deadline <= deadline);
        self.entries.insert(
            pos,
            Entry {
                deadline,
                id,
                payload,
            },
        );
        trace!("timer {:?} scheduled, {} pending", id, self.entries.len());
        id
    }

    /// Returns false if the entry already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops every pending entry, returning how many there were.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Time left until the earliest deadline, zero if it has passed.
    pub fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.entries
            .first()
            .map(|e| e.deadline.saturating_duration_since(now))
    }

    /// Removes and returns expired payloads in deadline order.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<T> {
        let expired = self.entries.partition_point(|e| e.deadline <= now);
        self.entries
            .drain(..expired)
            .map(|e| e.payload)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
