//! Clock and blocking-delay adapters.
//!
//! - **`target_os = "espidf"`**: the millisecond tick wraps
//!   `esp_timer_get_time()` (microseconds since boot, monotonic).
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for host-side
//!   testing and simulation.
//!
//! [`StdDelay`] sleeps the calling thread; under ESP-IDF std that is a
//! FreeRTOS task delay, so it serves both targets.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::app::ports::ClockPort;

/// Millisecond tick since boot, truncated to `u32` (wraps after ~49.7 days).
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl ClockPort for SystemClock {
    fn now_ms(&self) -> u32 {
        (self.uptime_us() / 1000) as u32
    }
}

/// [`DelayNs`] that blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
