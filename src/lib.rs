//! Strictly Autopilot - the decision core of a tic-tac-toe autoplayer
//!
//! Plays tic-tac-toe on a third-party site on the operator's behalf,
//! classifies opponents as bots or humans, and paces matchmaking against
//! loss, duration and leaderboard limits.
//!
//! # Architecture
//!
//! - **Engine**: depth-limited minimax with an optional scripted opening
//! - **Classifier**: known-bot registry, profile-name check, timing and name heuristics
//! - **Episode machine**: matchmaking, play, result detection and continuation policy
//! - **Ledger**: counters and bounded histories, persisted as JSON
//! - **Collaborators**: traits for the page (sensor, actuator, profile oracle, leaderboard)
//! - **Simulation**: an in-process table implementing every collaborator
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_autopilot::{
//!     AutopilotConfig, Autopilot, JsonFileStore, ScriptedOpponent, SimulatedTable,
//!     TableSettings, TracingSink,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let opponent = "Katha".parse::<ScriptedOpponent>().map_err(anyhow::Error::msg)?;
//! let table = SimulatedTable::new(vec![opponent], TableSettings::default());
//! let report = Autopilot::new(
//!     table.collaborators(Arc::new(TracingSink)),
//!     Arc::new(JsonFileStore::new("ledger.json")),
//! )
//! .with_config(AutopilotConfig::default())
//! .enable_on_start(true)
//! .with_max_episodes(Some(3))
//! .run()
//! .await;
//! println!("{} games, {}% won", report.episodes_completed(), report.ledger().win_rate());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod classifier;
mod collaborators;
mod config;
mod engine;
mod episode;
mod games;
mod ledger;
mod notify;
mod poll;
mod runner;
mod sim;
mod store;

// Crate-level exports - Board model
pub use games::tictactoe::{Board, BoardError, Cell, Mark, Move, Position, Symbol};

// Crate-level exports - Move engine
pub use engine::{MovePlanner, MoveSource, SearchDepth, best_move, opening_override, score_moves};

// Crate-level exports - Opponent classification
pub use classifier::{
    Classification, DEFAULT_KNOWN_BOTS, DetectionMethod, DetectionRecord, Evidence,
    HeuristicThresholds, KnownBotRegistry, OpponentClassifier, OpponentIdentity, Sensitivity,
    Signals, Verdict, is_bot_like_name, same_name, score_heuristics, timing_variance,
};

// Crate-level exports - Episode state machine
pub use episode::{
    Continuation, Episode, EpisodeMachine, GameOutcome, GameRecord, Phase, StopHandle,
    StopReason, TickOutcome, decide_continuation, leaderboard_target_hit, outcome_from_board,
    outcome_from_round_text,
};

// Crate-level exports - Session ledger
pub use ledger::{MoveTimer, RingBuffer, SessionLedger};

// Crate-level exports - Collaborators
pub use collaborators::{
    ActuationError, Actuator, BoardSensor, Collaborators, LeaderboardProbe, ProfileOracle,
    SensorError, SensorReading,
};

// Crate-level exports - Notifications
pub use notify::{ChannelSink, Notification, NotificationSink, TracingSink};

// Crate-level exports - Persistence
pub use store::{JsonFileStore, LedgerStore, StoreError};

// Crate-level exports - Configuration
pub use config::{AutopilotConfig, ConfigError};

// Crate-level exports - Polling
pub use poll::{PollOutcome, PollPolicy, poll_or_fallback, poll_until, poll_until_cancelled};

// Crate-level exports - Runner
pub use runner::{Autopilot, RunReport};

// Crate-level exports - Simulation
pub use sim::{
    OpponentStyle, POINTS_PER_WIN, ScriptedOpponent, SimulatedTable, TableSettings, TableStats,
};
