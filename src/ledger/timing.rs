//! Opponent reply timing.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

/// Measures how long the opponent takes to hand the turn back.
///
/// The clock starts when the operator places a mark and stops the first
/// time the turn is observed back on the operator's side.
#[derive(Debug, Clone, Default)]
pub struct MoveTimer {
    baseline: Option<DateTime<Utc>>,
}

impl MoveTimer {
    /// Creates a timer with no baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets any running measurement.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Starts measuring from `now`.
    #[instrument(skip(self))]
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.baseline = Some(now);
    }

    /// Stops the running measurement, returning the elapsed milliseconds.
    ///
    /// Returns `None` when no measurement was running.
    #[instrument(skip(self))]
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<u64> {
        let started = self.baseline.take()?;
        let elapsed = (now - started).num_milliseconds().max(0) as u64;
        debug!(elapsed_ms = elapsed, "Opponent reply timed");
        Some(elapsed)
    }

    /// True while a measurement is running.
    pub fn is_running(&self) -> bool {
        self.baseline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_stop_without_start_is_none() {
        let mut timer = MoveTimer::new();
        assert_eq!(timer.stop(Utc::now()), None);
    }

    #[test]
    fn test_measures_once() {
        let mut timer = MoveTimer::new();
        let t0 = Utc::now();
        timer.start(t0);
        assert_eq!(timer.stop(t0 + Duration::milliseconds(1_250)), Some(1_250));
        assert!(!timer.is_running());
        assert_eq!(timer.stop(t0 + Duration::milliseconds(2_000)), None);
    }
}
