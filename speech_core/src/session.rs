//! Session epochs.
//!
//! Every asynchronous completion carries the epoch that was current when the
//! work started. An interrupt advances the clock, so completions from the
//! previous session compare unequal and are dropped.
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Epoch(u64);

impl Epoch {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct SessionClock {
    current: Epoch,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Epoch {
        self.current
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current == epoch
    }

    /// Start a new session, invalidating everything captured before.
    pub fn advance(&mut self) -> Epoch {
        self.current = Epoch(self.current.0 + 1);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_invalidates_captured_epoch() {
        let mut clock = SessionClock::new();
        let captured = clock.current();
        assert!(clock.is_current(captured));

        let next = clock.advance();
        assert!(next > captured);
        assert!(!clock.is_current(captured));
        assert!(clock.is_current(next));
    }
}
