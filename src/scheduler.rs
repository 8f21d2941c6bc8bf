//! Periodic work on a wrapping millisecond tick.
//!
//! The control loop polls two timers each iteration: the heartbeat and
//! the firmware update check.  Both run off the same `u32` tick since
//! boot, which wraps after ~49.7 days; comparisons use `wrapping_sub` so
//! the schedule survives the wrap.
//!
//! ```text
//!   last ─────────── interval ──────────▶│ fire, last = now
//!                                        │
//!   u32::MAX ─╮ wrap ╭─ 0 … elapsed still correct via wrapping_sub
//! ```

/// Fires once `interval_ms` has strictly elapsed since it last fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    interval_ms: u32,
    last_ms: u32,
}

impl IntervalTimer {
    /// Start counting from `now_ms`.
    pub const fn new(interval_ms: u32, now_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: now_ms,
        }
    }

    /// `true` when due; records `now_ms` as the new reference point.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.elapsed(now_ms) > self.interval_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn elapsed(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.last_ms)
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}
