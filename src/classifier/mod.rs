//! Opponent classification.

mod detector;
mod heuristics;
mod registry;

pub use detector::{
    Classification, DetectionMethod, DetectionRecord, Evidence, OpponentClassifier,
    OpponentIdentity, Verdict,
};
pub use heuristics::{
    HeuristicThresholds, Sensitivity, Signals, is_bot_like_name, score_heuristics,
    timing_variance,
};
pub use registry::{DEFAULT_KNOWN_BOTS, KnownBotRegistry, same_name};
