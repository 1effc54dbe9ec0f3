//! Episode lifecycle types.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::classifier::{OpponentIdentity, Verdict};
use crate::games::tictactoe::Symbol;

/// Where the autopilot is in the play cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
pub enum Phase {
    /// Not playing; auto-play may be disabled.
    #[default]
    Idle,
    /// Waiting for a board (new opponent or rematch).
    Matchmaking,
    /// A game is being played.
    InProgress,
    /// The game just finished.
    Ended,
    /// Choosing between rematch, rotation and stopping.
    Deciding,
}

/// Game result from the operator's perspective.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameOutcome {
    /// Operator won.
    Win,
    /// Operator lost.
    Loss,
    /// Board filled with no line.
    Draw,
    /// Finished without a readable result.
    Unknown,
}

/// Why auto-play stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum StopReason {
    /// Loss cap reached.
    #[strum(to_string = "loss limit reached")]
    LossLimit,
    /// Leaderboard score target reached.
    #[strum(to_string = "leaderboard target reached")]
    LeaderboardTarget,
    /// Session duration ceiling passed.
    #[strum(to_string = "session duration limit reached")]
    SessionDuration,
    /// Stopped by the user.
    #[strum(to_string = "stopped by user")]
    Manual,
    /// Sensing or actuation kept failing.
    #[strum(to_string = "too many consecutive errors")]
    SafeMode,
}

/// What to do after a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Disable auto-play.
    Stop(StopReason),
    /// Play the same opponent again.
    Rematch,
    /// Leave and find a new opponent.
    Rotate,
}

/// One game from first board to result.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct Episode {
    opponent: OpponentIdentity,
    symbol: Option<Symbol>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    outcome: Option<GameOutcome>,
}

impl Episode {
    /// Opens an episode.
    #[instrument]
    pub fn start(opponent: OpponentIdentity, symbol: Option<Symbol>, now: DateTime<Utc>) -> Self {
        Self {
            opponent,
            symbol,
            started_at: now,
            ended_at: None,
            outcome: None,
        }
    }

    /// Closes the episode with its result.
    #[instrument(skip(self))]
    pub fn finish(&mut self, outcome: GameOutcome, now: DateTime<Utc>) {
        self.ended_at = Some(now);
        self.outcome = Some(outcome);
    }

    /// Milliseconds between start and end (or `now` while open).
    pub fn duration_ms(&self, now: DateTime<Utc>) -> u64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// A finished game as kept in the ledger.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct GameRecord {
    outcome: GameOutcome,
    opponent: String,
    verdict: Option<Verdict>,
    duration_ms: u64,
    finished_at: DateTime<Utc>,
}

impl GameRecord {
    /// Builds the record for a closed episode.
    #[instrument(skip(episode))]
    pub fn from_episode(episode: &Episode, verdict: Option<Verdict>, now: DateTime<Utc>) -> Self {
        Self {
            outcome: episode.outcome.unwrap_or(GameOutcome::Unknown),
            opponent: episode.opponent.display_name().clone(),
            verdict,
            duration_ms: episode.duration_ms(now),
            finished_at: episode.ended_at.unwrap_or(now),
        }
    }
}
