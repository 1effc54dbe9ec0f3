//! Heuristic bot scoring from name shape and reply timing.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::detector::Evidence;

/// Score added for a reply faster than the fast threshold.
pub const FAST_RESPONSE_WEIGHT: f64 = 0.3;
/// Score removed for a reply slower than the slow threshold.
pub const SLOW_RESPONSE_WEIGHT: f64 = 0.3;
/// Score added for a bot-like display name.
pub const NAME_PATTERN_WEIGHT: f64 = 0.4;
/// Score added for low reply-time variance.
pub const CONSISTENT_TIMING_WEIGHT: f64 = 0.2;
/// Samples required before variance is considered.
pub const MIN_TIMING_SAMPLES: usize = 3;

/// How readily a heuristic score becomes a bot verdict.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sensitivity {
    /// Needs 0.7.
    Conservative,
    /// Needs 0.5.
    #[default]
    Balanced,
    /// Needs 0.3.
    Aggressive,
}

impl Sensitivity {
    /// Minimum heuristic score for a bot verdict.
    pub fn threshold(self) -> f64 {
        match self {
            Sensitivity::Conservative => 0.7,
            Sensitivity::Balanced => 0.5,
            Sensitivity::Aggressive => 0.3,
        }
    }
}

/// Timing thresholds for heuristic scoring.
#[derive(Debug, Clone, Copy, PartialEq, Getters, new)]
pub struct HeuristicThresholds {
    fast_ms: u64,
    slow_ms: u64,
    low_variance_ms2: f64,
}

impl Default for HeuristicThresholds {
    fn default() -> Self {
        Self::new(3_000, 8_000, 1_000_000.0)
    }
}

/// Timing observations about the current opponent.
#[derive(Debug, Clone, Default, PartialEq, Getters, new)]
pub struct Signals {
    /// Latest reply time, if one has been measured.
    response_time_ms: Option<u64>,
    /// Recent reply times, oldest first.
    move_times_ms: Vec<u64>,
}

/// True when `name` looks machine-generated.
///
/// Matches `bot`/`ai` as prefix or suffix, all-digit names, `user<digits>`,
/// `player<digits>`, and `guest`/`anon`/`temp` prefixes, ignoring case.
#[instrument]
pub fn is_bot_like_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }

    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    lower.starts_with("bot")
        || lower.ends_with("bot")
        || lower.starts_with("ai")
        || lower.ends_with("ai")
        || all_digits(&lower)
        || lower.strip_prefix("user").is_some_and(all_digits)
        || lower.strip_prefix("player").is_some_and(all_digits)
        || ["guest", "anon", "temp"].iter().any(|p| lower.starts_with(p))
}

/// Population variance of the samples; `None` below [`MIN_TIMING_SAMPLES`].
pub fn timing_variance(samples: &[u64]) -> Option<f64> {
    if samples.len() < MIN_TIMING_SAMPLES {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|s| *s as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|s| {
            let d = *s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some(variance)
}

/// Accumulates the heuristic score for `name`, returning the raw score and
/// the evidence that produced it.
#[instrument(skip(signals, thresholds))]
pub fn score_heuristics(
    name: &str,
    signals: &Signals,
    thresholds: &HeuristicThresholds,
) -> (f64, Vec<Evidence>) {
    let mut score = 0.0;
    let mut evidence = Vec::new();

    if let Some(ms) = signals.response_time_ms {
        if ms < thresholds.fast_ms {
            score += FAST_RESPONSE_WEIGHT;
            evidence.push(Evidence::FastResponse { ms });
        } else if ms > thresholds.slow_ms {
            score -= SLOW_RESPONSE_WEIGHT;
            evidence.push(Evidence::SlowResponse { ms });
        }
    }

    if is_bot_like_name(name) {
        score += NAME_PATTERN_WEIGHT;
        evidence.push(Evidence::BotLikeName);
    }

    if let Some(variance) = timing_variance(&signals.move_times_ms)
        && variance < thresholds.low_variance_ms2
    {
        score += CONSISTENT_TIMING_WEIGHT;
        evidence.push(Evidence::ConsistentTiming { variance });
    }

    debug!(score, factors = evidence.len(), "Heuristic score");
    (score, evidence)
}
