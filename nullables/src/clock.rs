//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use drawtree_types::Clock;

/// A deterministic clock. Time only advances when you tell it to.
///
/// Shareable across tasks, so a test can move time while a node reads it.
#[derive(Debug, Default)]
pub struct NullClock {
    current_ms: AtomicU64,
}

impl NullClock {
    pub fn new(initial_ms: u64) -> Self {
        Self {
            current_ms: AtomicU64::new(initial_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.current_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.current_ms.store(millis, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now_millis(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_moves_only_on_request() {
        let clock = NullClock::new(2_500);
        assert_eq!(clock.now_millis(), 2_500);
        assert_eq!(clock.current_slot(1_000), 2);
        assert_eq!(clock.until_next_slot(1_000), Duration::from_millis(500));

        clock.advance(Duration::from_millis(600));
        assert_eq!(clock.current_slot(1_000), 3);

        clock.set(0);
        assert_eq!(clock.current_slot(1_000), 0);
        assert_eq!(clock.until_next_slot(1_000), Duration::from_secs(1));
    }
}
