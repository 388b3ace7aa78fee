//! Time-windowed value stabilizer.
//!
//! A new value is held as pending and only becomes active once it has stayed
//! unchanged for the configured delay. Every `push` rearms the window. The
//! debouncer owns no timer: callers pass the current instant and poll.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    active: T,
    pending: Option<(T, Instant)>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    /// Starts with `initial` already active, like an input's first render.
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            delay,
            active: initial,
            pending: None,
        }
    }

    /// Records a new raw value at `now`, discarding any pending one and rearming the window.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    /// Promotes the pending value if its window has elapsed.
    ///
    /// Returns the newly active value when it differs from the previous one.
    pub fn poll(&mut self, now: Instant) -> Option<&T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => {}
            _ => return None,
        }
        let (value, _) = self.pending.take()?;
        if value == self.active {
            return None;
        }
        self.active = value;
        Some(&self.active)
    }

    /// The value that has settled.
    pub fn active(&self) -> &T {
        &self.active
    }

    /// When the pending value will settle, if one is waiting.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
