//! Adaptive polling interval.
//!
//! Poll every second while water is flowing, then double the interval on
//! every idle cycle until the 30 second baseline is reached.

use std::time::Duration;

/// Fastest polling interval, used while water is drawn.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Idle baseline and initial interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(30);

/// A polling interval bounded to `[MIN_INTERVAL, MAX_INTERVAL]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollInterval(Duration);

impl PollInterval {
    /// Clamp `duration` into the allowed range.
    pub fn new(duration: Duration) -> Self {
        Self(duration.clamp(MIN_INTERVAL, MAX_INTERVAL))
    }

    pub fn min() -> Self {
        Self(MIN_INTERVAL)
    }

    pub fn max() -> Self {
        Self(MAX_INTERVAL)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Interval to use after a snapshot reporting `current_flow` (l/h).
    pub fn next(self, current_flow: i64) -> Self {
        Self::new(next_interval(self.0, current_flow))
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::max()
    }
}

impl From<PollInterval> for Duration {
    fn from(interval: PollInterval) -> Self {
        interval.0
    }
}

/// Compute the interval following `previous` given the decoded flow.
///
/// Whole seconds only; any sub-second part of `previous` is dropped before
/// doubling.
pub fn next_interval(previous: Duration, current_flow: i64) -> Duration {
    if current_flow > 0 {
        return MIN_INTERVAL;
    }
    let previous_secs = previous.as_secs();
    if previous_secs >= MAX_INTERVAL.as_secs() {
        return previous;
    }
    Duration::from_secs(MAX_INTERVAL.as_secs().min(previous_secs * 2))
}
