// src/keyboard/release.rs

//! Debounced key releases.
//!
//! A lifted key is released after a short delay. At most one release is
//! pending per key: pressing the key again first takes its pending release,
//! so the caller can run it before the new press and presses and releases
//! stay paired.

use super::model::KeyId;
use crate::timer::{TimerId, TimerQueue};
use log::trace;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ReleaseQueue {
    timers: TimerQueue<KeyId>,
    pending: HashMap<KeyId, TimerId>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the release of `id` after `delay`, replacing any release
    /// already pending for it.
    pub fn schedule(&mut self, now: Instant, delay: Duration, id: KeyId) {
        let timer = self.timers.schedule(now, delay, id);
        if let Some(previous) = self.pending.insert(id, timer) {
            self.timers.cancel(previous);
        }
    }

    /// Cancels the pending release of `id`. Returns true if there was one;
    /// the caller then owes the key its release.
    pub fn take(&mut self, id: KeyId) -> bool {
        match self.pending.remove(&id) {
            Some(timer) => {
                trace!("release of key {} taken early", id.index());
                self.timers.cancel(timer)
            }
            None => false,
        }
    }

    /// Keys whose release is due, in deadline order.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<KeyId> {
        let due = self.timers.pop_expired(now);
        for id in &due {
            self.pending.remove(id);
        }
        due
    }

    pub fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.timers.next_timeout(now)
    }

    /// Drops every pending release, returning how many there were.
    pub fn cancel_all(&mut self) -> usize {
        self.pending.clear();
        self.timers.cancel_all()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::mock::FixedGlyphMetrics;
    use crate::keyboard::LayoutParser;

    const DELAY: Duration = Duration::from_millis(100);
    const GLYPH: FixedGlyphMetrics = FixedGlyphMetrics::new(10, 16);

    fn two_keys() -> (KeyId, KeyId) {
        let keyboard = LayoutParser::new(&GLYPH, None)
            .parse(r#"<row><key><default display="a"/></key><key><default display="b"/></key></row>"#.as_bytes())
            .expect("layout parses");
        (keyboard.keys()[0].id(), keyboard.keys()[1].id())
    }

    #[test]
    fn releases_fire_after_delay() {
        let (a, b) = two_keys();
        let start = Instant::now();
        let mut releases = ReleaseQueue::new();
        releases.schedule(start, DELAY, a);
        releases.schedule(start + DELAY / 2, DELAY, b);

        assert_eq!(releases.next_timeout(start), Some(DELAY));
        assert!(releases.pop_expired(start + DELAY / 2).is_empty());
        assert_eq!(releases.pop_expired(start + DELAY), vec![a]);
        assert_eq!(releases.pop_expired(start + 2 * DELAY), vec![b]);
        assert!(releases.is_empty());
        assert!(!releases.take(a));
    }

    #[test]
    fn taking_a_release_cancels_its_timer() {
        let (a, b) = two_keys();
        let start = Instant::now();
        let mut releases = ReleaseQueue::new();
        releases.schedule(start, DELAY, a);
        releases.schedule(start, DELAY, b);

        assert!(releases.take(a));
        assert!(!releases.take(a));
        assert_eq!(releases.pop_expired(start + DELAY), vec![b]);
    }

    #[test]
    fn rescheduling_keeps_one_release_per_key() {
        let (a, _) = two_keys();
        let start = Instant::now();
        let mut releases = ReleaseQueue::new();
        releases.schedule(start, DELAY, a);
        releases.schedule(start + DELAY / 2, DELAY, a);

        assert!(releases.pop_expired(start + DELAY).is_empty());
        assert_eq!(releases.pop_expired(start + 2 * DELAY), vec![a]);
    }

    #[test]
    fn cancel_all_drops_everything() {
        let (a, b) = two_keys();
        let start = Instant::now();
        let mut releases = ReleaseQueue::new();
        releases.schedule(start, DELAY, a);
        releases.schedule(start, DELAY, b);

        assert_eq!(releases.cancel_all(), 2);
        assert!(!releases.take(a));
        assert!(releases.pop_expired(start + DELAY).is_empty());
    }
}
