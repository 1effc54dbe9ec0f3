//! Interfaces to the page the autopilot plays on.
//!
//! Everything that touches the site (reading the board, clicking buttons,
//! opening profile panels) sits behind these traits so the decision core
//! can run against test doubles or the simulated table.

use std::sync::Arc;

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;

use crate::games::tictactoe::{Board, Position, Symbol};
use crate::notify::NotificationSink;

/// One observation of the game surface.
#[derive(Debug, Clone, PartialEq, Getters, new)]
pub struct SensorReading {
    /// Board from the operator's point of view.
    board: Board,
    /// Symbol the operator holds this game, when the turn indicator shows it.
    my_symbol: Option<Symbol>,
    /// Whether the turn indicator shows the operator to move.
    my_turn: bool,
    /// Opponent display name, when visible.
    opponent_name: Option<String>,
    /// Text of an end-of-round banner, when one is showing.
    round_over_text: Option<String>,
}

/// Reads the game surface.
#[async_trait::async_trait]
pub trait BoardSensor: Send + Sync {
    /// Returns the current reading, or `None` when no game is on screen.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError`] when the surface is present but unreadable.
    async fn read(&self) -> Result<Option<SensorReading>, SensorError>;
}

/// Clicks things on the page.
#[async_trait::async_trait]
pub trait Actuator: Send + Sync {
    /// Places the operator's mark.
    async fn place_mark(&self, pos: Position) -> Result<(), ActuationError>;

    /// Enters the matchmaking queue.
    async fn start_matchmaking(&self) -> Result<(), ActuationError>;

    /// Offers a rematch to the current opponent.
    async fn request_rematch(&self) -> Result<(), ActuationError>;

    /// Leaves the current room.
    async fn leave_room(&self) -> Result<(), ActuationError>;
}

/// Resolves account names through the opponent's profile panel.
#[async_trait::async_trait]
pub trait ProfileOracle: Send + Sync {
    /// The account name behind `display_name`, or `None` when the profile
    /// cannot be read.
    async fn resolve_authoritative_name(&self, display_name: &str) -> Option<String>;

    /// Closes the profile panel if it was left open.
    async fn close_panel(&self) {}
}

/// Reads the operator's leaderboard score.
#[async_trait::async_trait]
pub trait LeaderboardProbe: Send + Sync {
    /// Current score, or `None` when it cannot be read.
    async fn current_score(&self) -> Option<u32>;
}

/// The full set of page collaborators handed to the episode machine.
#[derive(Clone, Getters)]
pub struct Collaborators {
    sensor: Arc<dyn BoardSensor>,
    actuator: Arc<dyn Actuator>,
    oracle: Arc<dyn ProfileOracle>,
    leaderboard: Arc<dyn LeaderboardProbe>,
    sink: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// Bundles the collaborators.
    pub fn new(
        sensor: Arc<dyn BoardSensor>,
        actuator: Arc<dyn Actuator>,
        oracle: Arc<dyn ProfileOracle>,
        leaderboard: Arc<dyn LeaderboardProbe>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            sensor,
            actuator,
            oracle,
            leaderboard,
            sink,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Sensing error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Sensor error: {} at {}:{}", message, file, line)]
pub struct SensorError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SensorError {
    /// Creates a new sensor error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Actuation error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Actuation error: {} at {}:{}", message, file, line)]
pub struct ActuationError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ActuationError {
    /// Creates a new actuation error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
