//! Clocks and helpers for working with [SystemTime].

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Interface for reading the current wall-clock time.
///
/// Components that make time-based decisions (readmission, reschedule intervals, latency
/// attribution) take a [Clock] instead of calling [SystemTime::now] so that tests can drive time
/// explicitly.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn current(&self) -> SystemTime;
}

/// A [Clock] backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A [Clock] that only moves when told to.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(UNIX_EPOCH)
    }
}

impl ManualClock {
    /// Create a new clock starting at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = now.saturating_add_duration(duration);
    }

    /// Set the clock to `time` (which may be in the past).
    pub fn set(&self, time: SystemTime) {
        *self.now.lock().unwrap() = time;
    }
}

impl Clock for ManualClock {
    fn current(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// Extension trait to add methods to [SystemTime].
pub trait SystemTimeExt {
    /// Adds `duration`, saturating at the latest representable time.
    fn saturating_add_duration(&self, duration: Duration) -> SystemTime;

    /// Returns the time elapsed from `earlier` to `self`, or zero if `earlier` is later.
    fn saturating_since(&self, earlier: SystemTime) -> Duration;
}

impl SystemTimeExt for SystemTime {
    fn saturating_add_duration(&self, duration: Duration) -> SystemTime {
        self.checked_add(duration).unwrap_or_else(|| {
            // Bisect down to the largest representable offset
            let mut low = Duration::ZERO;
            let mut high = duration;
            while high - low > Duration::from_nanos(1) {
                let mid = low + (high - low) / 2;
                if self.checked_add(mid).is_some() {
                    low = mid;
                } else {
                    high = mid;
                }
            }
            *self + low
        })
    }

    fn saturating_since(&self, earlier: SystemTime) -> Duration {
        self.duration_since(earlier).unwrap_or_default()
    }
}
