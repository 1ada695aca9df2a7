//! Wall-clock access and slot arithmetic.
//!
//! Slots are derived from Unix time in milliseconds: slot `n` covers
//! `[n * duration, (n + 1) * duration)`. All replicas are assumed to have
//! roughly synchronised clocks.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time, swappable for a deterministic clock in tests.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    fn current_slot(&self, slot_duration_ms: u64) -> u64 {
        slot_at(self.now_millis(), slot_duration_ms)
    }

    /// Time left until the next slot boundary.
    fn until_next_slot(&self, slot_duration_ms: u64) -> Duration {
        let now = self.now_millis();
        let next = slot_start_millis(slot_at(now, slot_duration_ms) + 1, slot_duration_ms);
        Duration::from_millis(next.saturating_sub(now))
    }
}

/// The operating system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

pub fn slot_at(now_millis: u64, slot_duration_ms: u64) -> u64 {
    now_millis / slot_duration_ms.max(1)
}

pub fn slot_start_millis(slot: u64, slot_duration_ms: u64) -> u64 {
    slot.saturating_mul(slot_duration_ms.max(1))
}
