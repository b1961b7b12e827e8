//! Time sources for readiness polling

#[cfg(feature = "alloc")]
use alloc::rc::Rc;
#[cfg(feature = "alloc")]
use core::cell::Cell;

use super::Clock;

/// Wall-clock time source backed by `std::time::Instant`
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }

    fn delay_us(&mut self, us: u32) {
        if us > 0 {
            std::thread::sleep(std::time::Duration::from_micros(us as u64));
        }
    }
}

/// Simulated time source that only advances when slept on
///
/// Clones share the same counter, so a test can keep one handle while the
/// driver owns another and observe exactly how much time the driver spent
/// waiting.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_us: Rc<Cell<u64>>,
}

#[cfg(feature = "alloc")]
impl ManualClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time in microseconds
    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    /// Move simulated time forward
    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

#[cfg(feature = "alloc")]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1000
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.advance_us(ms as u64 * 1000);
    }

    fn delay_us(&mut self, us: u32) {
        self.advance_us(us as u64);
    }
}
