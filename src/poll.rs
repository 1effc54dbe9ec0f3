//! Bounded waiting on the page: poll a predicate at a fixed interval and
//! give up after a fixed number of attempts.

use std::future::Future;
use std::time::Duration;

use derive_getters::Getters;
use derive_new::new;
use tracing::{debug, instrument, warn};

/// Interval and attempt budget for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, new)]
pub struct PollPolicy {
    interval: Duration,
    max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 20)
    }
}

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate held on this attempt (1-based).
    Satisfied(u32),
    /// Every attempt failed.
    Exhausted,
    /// The wait was abandoned before the predicate held.
    Cancelled,
}

impl PollOutcome {
    /// True when the predicate held.
    pub fn is_satisfied(self) -> bool {
        matches!(self, PollOutcome::Satisfied(_))
    }
}

/// Polls `predicate` until it returns true or the attempts run out.
///
/// The first attempt runs immediately; later attempts wait `interval`.
#[instrument(skip(predicate), fields(
    interval_ms = policy.interval.as_millis() as u64,
    max_attempts = policy.max_attempts,
))]
pub async fn poll_until<F, Fut>(policy: PollPolicy, predicate: F) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_until_cancelled(policy, || false, predicate).await
}

/// Like [`poll_until`], but gives up as soon as `cancelled` returns true.
///
/// `cancelled` is checked before every attempt, including after each
/// sleep, so a cancellation never lets another attempt run.
#[instrument(skip(cancelled, predicate))]
pub async fn poll_until_cancelled<C, F, Fut>(
    policy: PollPolicy,
    cancelled: C,
    mut predicate: F,
) -> PollOutcome
where
    C: Fn() -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.interval).await;
        }
        if cancelled() {
            debug!(attempt, "Poll cancelled");
            return PollOutcome::Cancelled;
        }
        if predicate().await {
            debug!(attempt, "Poll satisfied");
            return PollOutcome::Satisfied(attempt);
        }
    }
    warn!("Poll exhausted without success");
    PollOutcome::Exhausted
}

/// Polls `predicate`; when the attempts run out, runs `fallback` instead.
///
/// A cancelled wait runs neither further attempts nor the fallback.
#[instrument(skip(cancelled, predicate, fallback))]
pub async fn poll_or_fallback<C, F, Fut, G, GFut>(
    policy: PollPolicy,
    cancelled: C,
    predicate: F,
    fallback: G,
) -> PollOutcome
where
    C: Fn() -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
    G: FnOnce() -> GFut,
    GFut: Future<Output = ()>,
{
    let outcome = poll_until_cancelled(policy, cancelled, predicate).await;
    if outcome == PollOutcome::Exhausted {
        debug!("Running poll fallback");
        fallback().await;
    }
    outcome
}
