//! Clocks and timeout timers for externally-driven time.
//!
//! Time is a plain `f64` of seconds. A [`Clock`] either tracks real wall-clock
//! time or is driven entirely by [`Clock::update`] calls from outside; the
//! mode is fixed when the clock is constructed. [`TimeoutTimer`] snapshots a
//! start instant from a clock and derives its state on demand, so any number
//! of timers can share one clock without holding references to it.
//!
//! Comparisons against a timer's deadline use [`is_close`] so a wake-up
//! scheduled for exactly the deadline instant still fires despite float
//! rounding.

use std::time::{SystemTime, UNIX_EPOCH};

/// Relative tolerance for [`is_close`], matching IEEE-double round-trip noise.
const REL_TOLERANCE: f64 = 1e-9;

/// Whether two times are equal within relative tolerance.
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

/// Time source for clocked links, pipes, and pipelines.
///
/// A real-time clock reads the system clock and ignores [`Clock::update`];
/// an externally-driven clock reports exactly the last updated value.
#[derive(Debug, Clone)]
pub struct Clock {
    /// `None` in real-time mode; the current time otherwise.
    time: Option<f64>,
}

impl Clock {
    /// Create a real-time clock. `update` calls on it are no-ops.
    pub fn realtime() -> Self {
        Self { time: None }
    }

    /// Create an externally-driven clock starting at `start`.
    pub fn external(start: f64) -> Self {
        Self { time: Some(start) }
    }

    /// Whether this clock only moves when [`Clock::update`] is called.
    pub fn is_external(&self) -> bool {
        self.time.is_some()
    }

    /// The current time in seconds.
    pub fn time(&self) -> f64 {
        match self.time {
            Some(time) => time,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64(),
        }
    }

    /// Advance an externally-driven clock. No-op in real-time mode.
    pub fn update(&mut self, time: f64) {
        if self.time.is_some() {
            self.time = Some(time);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::realtime()
    }
}

/// A one-shot timer measured against a [`Clock`].
///
/// The timer holds only its own state (enabled flag, timeout, start
/// snapshot); every derived property takes the clock to measure against.
/// A disabled timer reports its derived properties as absent.
#[derive(Debug, Clone, Default)]
pub struct TimeoutTimer {
    enabled: bool,
    timeout: Option<f64>,
    start_time: Option<f64>,
}

impl TimeoutTimer {
    /// Create a stopped timer with an optional preset timeout.
    pub fn new(timeout: Option<f64>) -> Self {
        Self {
            enabled: false,
            timeout,
            start_time: None,
        }
    }

    /// Whether the timer is counting.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The configured timeout, if any.
    pub fn timeout(&self) -> Option<f64> {
        self.timeout
    }

    /// The instant the timer last started, if running.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Start counting from the clock's current time with the preset timeout.
    pub fn start(&mut self, clock: &Clock) {
        self.enabled = true;
        self.start_time = Some(clock.time());
    }

    /// Set a new timeout and start counting from the clock's current time.
    pub fn restart(&mut self, timeout: f64, clock: &Clock) {
        self.timeout = Some(timeout);
        self.start(clock);
    }

    /// Re-snapshot the start instant without toggling the enabled flag.
    pub fn reset(&mut self, clock: &Clock) {
        self.start_time = Some(clock.time());
    }

    /// Stop counting and clear the start snapshot.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.start_time = None;
    }

    /// The instant the timer fires: start plus timeout. Absent when the
    /// timer is disabled or has no timeout.
    pub fn timeout_time(&self) -> Option<f64> {
        match (self.enabled, self.start_time, self.timeout) {
            (true, Some(start), Some(timeout)) => Some(start + timeout),
            _ => None,
        }
    }

    /// Seconds since the timer started. Absent when disabled.
    pub fn elapsed(&self, clock: &Clock) -> Option<f64> {
        match (self.enabled, self.start_time) {
            (true, Some(start)) => Some(clock.time() - start),
            _ => None,
        }
    }

    /// Seconds until the timer fires, clamped at zero. Absent when disabled.
    pub fn remaining(&self, clock: &Clock) -> Option<f64> {
        let timeout = self.timeout?;
        let elapsed = self.elapsed(clock)?;
        Some((timeout - elapsed).max(0.0))
    }

    /// Whether the timer is counting and has not yet reached its timeout.
    pub fn running(&self, clock: &Clock) -> bool {
        match (self.elapsed(clock), self.timeout) {
            (Some(elapsed), Some(timeout)) => {
                elapsed < timeout && !is_close(elapsed, timeout)
            }
            _ => false,
        }
    }

    /// Whether the timer has reached (or passed within tolerance of) its
    /// timeout. Disabled timers never report timed out.
    pub fn timed_out(&self, clock: &Clock) -> bool {
        match (self.elapsed(clock), self.timeout) {
            (Some(elapsed), Some(timeout)) => {
                elapsed >= timeout || is_close(elapsed, timeout)
            }
            _ => false,
        }
    }
}

// === Tests ===
