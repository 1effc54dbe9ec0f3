//! An in-process game table that stands in for the real site.
//!
//! [`SimulatedTable`] implements every page collaborator over a shared
//! state: it seats scripted opponents in turn, plays their replies the
//! moment the operator moves, and answers profile lookups after a settle
//! delay.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use derive_getters::Getters;
use derive_new::new;
use tracing::{debug, info, instrument};

use crate::collaborators::{
    ActuationError, Actuator, BoardSensor, Collaborators, LeaderboardProbe, ProfileOracle,
    SensorError, SensorReading,
};
use crate::engine::{SearchDepth, best_move};
use crate::games::tictactoe::{Board, Mark, Position, Symbol};
use crate::notify::NotificationSink;

/// Points added to the scripted leaderboard score per operator win.
pub const POINTS_PER_WIN: u32 = 100;

/// How a scripted opponent picks its moves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum OpponentStyle {
    /// First empty cell in row-major order.
    #[default]
    FirstEmpty,
    /// Unbounded search.
    Perfect,
    /// One-ply search.
    Shallow,
}

impl OpponentStyle {
    /// The opponent's move on `board` (operator's point of view).
    pub fn choose(self, board: &Board) -> Option<Position> {
        let theirs = board.flipped();
        match self {
            OpponentStyle::FirstEmpty => board.empty_positions().next(),
            OpponentStyle::Perfect => best_move(&theirs, SearchDepth::Unbounded),
            OpponentStyle::Shallow => best_move(&theirs, SearchDepth::Limited(1)),
        }
    }
}

/// An opponent waiting in the simulated matchmaking queue.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct ScriptedOpponent {
    /// Name shown at the table.
    display_name: String,
    /// Account name; the display name when `None`.
    profile_name: Option<String>,
    /// Move selection.
    style: OpponentStyle,
}

impl ScriptedOpponent {
    /// Account name the profile panel reports.
    pub fn account_name(&self) -> &str {
        self.profile_name.as_deref().unwrap_or(&self.display_name)
    }
}

impl FromStr for ScriptedOpponent {
    type Err = String;

    /// Parses `NAME[:PROFILE][:STYLE]`. With two parts the second is a
    /// style when it names one, otherwise a profile name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let name = parts
            .first()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("Missing opponent name in '{}'", s))?
            .to_string();
        let profile = |p: &str| (!p.is_empty()).then(|| p.to_string());
        let style = |p: &str| {
            OpponentStyle::from_str(p).map_err(|_| format!("Unknown opponent style '{}'", p))
        };

        match parts[..] {
            [_] => Ok(Self::new(name, None, OpponentStyle::default())),
            [_, second] => match OpponentStyle::from_str(second) {
                Ok(s) => Ok(Self::new(name, None, s)),
                Err(_) => Ok(Self::new(name, profile(second), OpponentStyle::default())),
            },
            [_, p, st] => Ok(Self::new(name, profile(p), style(st)?)),
            _ => Err(format!("Expected NAME[:PROFILE][:STYLE], got '{}'", s)),
        }
    }
}

/// Knobs for the simulated site.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct TableSettings {
    /// Delay before the profile panel can be read.
    profile_settle: Duration,
    /// Starting leaderboard score; `None` hides the leaderboard.
    leaderboard_start: Option<u32>,
    /// Whether the rematch button ever appears.
    rematch_available: bool,
}

impl TableSettings {
    /// Creates settings.
    pub fn new(
        profile_settle: Duration,
        leaderboard_start: Option<u32>,
        rematch_available: bool,
    ) -> Self {
        Self {
            profile_settle,
            leaderboard_start,
            rematch_available,
        }
    }
}

impl Default for TableSettings {
    fn default() -> Self {
        Self::new(Duration::ZERO, None, true)
    }
}

/// Counters of what the autopilot asked the table to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters)]
pub struct TableStats {
    games_started: u32,
    marks_placed: u32,
    rematches: u32,
    rooms_left: u32,
    profile_lookups: u32,
    panels_closed: u32,
}

#[derive(Debug)]
struct TableState {
    queue: VecDeque<ScriptedOpponent>,
    seated: Option<ScriptedOpponent>,
    board: Option<Board>,
    my_symbol: Symbol,
    games_in_room: u32,
    round_over: Option<String>,
    score: Option<u32>,
    stats: TableStats,
}

impl TableState {
    fn my_turn(&self, board: &Board) -> bool {
        let mine = board.count(Mark::Mine);
        let theirs = board.count(Mark::Theirs);
        match self.my_symbol {
            Symbol::X => mine == theirs,
            Symbol::O => theirs > mine,
        }
    }

    /// Deals a fresh board; the seat alternates X and O between games.
    fn deal(&mut self) {
        self.my_symbol = if self.games_in_room % 2 == 0 {
            Symbol::X
        } else {
            Symbol::O
        };
        self.games_in_room += 1;
        self.stats.games_started += 1;
        self.round_over = None;
        let mut board = Board::new();
        if self.my_symbol == Symbol::O {
            self.opponent_reply(&mut board);
        }
        self.board = Some(board);
    }

    fn opponent_reply(&mut self, board: &mut Board) {
        let style = self
            .seated
            .as_ref()
            .map(|o| *o.style())
            .unwrap_or_default();
        if let Some(pos) = style.choose(board) {
            // The chosen cell comes from the board's own empties.
            let _ = board.place(pos, Mark::Theirs);
        }
    }

    fn close_round(&mut self, board: &Board) {
        let text = match board.winner() {
            Some(Mark::Mine) => {
                if let Some(score) = self.score.as_mut() {
                    *score += POINTS_PER_WIN;
                }
                "You win!"
            }
            Some(Mark::Theirs) => "You lose!",
            None => "It's a draw!",
        };
        debug!(board = %board, text, "Round over");
        self.round_over = Some(text.to_string());
    }
}

/// Shared simulated site. Clones share the same table.
#[derive(Debug, Clone)]
pub struct SimulatedTable {
    state: Arc<Mutex<TableState>>,
    settings: TableSettings,
}

impl SimulatedTable {
    /// Creates a table that seats `opponents` in order, cycling.
    #[instrument(skip(opponents), fields(opponents = opponents.len()))]
    pub fn new(opponents: Vec<ScriptedOpponent>, settings: TableSettings) -> Self {
        let state = TableState {
            queue: opponents.into(),
            seated: None,
            board: None,
            my_symbol: Symbol::X,
            games_in_room: 0,
            round_over: None,
            score: settings.leaderboard_start,
            stats: TableStats::default(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            settings,
        }
    }

    /// Bundles this table as every page collaborator.
    pub fn collaborators(&self, sink: Arc<dyn NotificationSink>) -> Collaborators {
        let table = Arc::new(self.clone());
        Collaborators::new(table.clone(), table.clone(), table.clone(), table, sink)
    }

    /// Counters so far.
    pub fn stats(&self) -> TableStats {
        self.lock().stats
    }

    /// Opponent currently seated.
    pub fn seated(&self) -> Option<ScriptedOpponent> {
        self.lock().seated.clone()
    }

    /// Current leaderboard score.
    pub fn score(&self) -> Option<u32> {
        self.lock().score
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl BoardSensor for SimulatedTable {
    async fn read(&self) -> Result<Option<SensorReading>, SensorError> {
        let state = self.lock();
        let Some(board) = state.board else {
            return Ok(None);
        };
        let my_turn = !board.is_terminal() && state.my_turn(&board);
        Ok(Some(SensorReading::new(
            board,
            Some(state.my_symbol),
            my_turn,
            state.seated.as_ref().map(|o| o.display_name().clone()),
            state.round_over.clone(),
        )))
    }
}

#[async_trait::async_trait]
impl Actuator for SimulatedTable {
    #[instrument(skip(self))]
    async fn place_mark(&self, pos: Position) -> Result<(), ActuationError> {
        let mut state = self.lock();
        let Some(mut board) = state.board else {
            return Err(ActuationError::new("No board on screen"));
        };
        if board.is_terminal() || !state.my_turn(&board) {
            return Err(ActuationError::new("Not the operator's turn"));
        }
        board
            .place(pos, Mark::Mine)
            .map_err(|e| ActuationError::new(e.message))?;
        state.stats.marks_placed += 1;

        if !board.is_terminal() {
            state.opponent_reply(&mut board);
        }
        if board.is_terminal() {
            state.close_round(&board);
        }
        state.board = Some(board);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn start_matchmaking(&self) -> Result<(), ActuationError> {
        let mut state = self.lock();
        if state.seated.is_some() {
            return Err(ActuationError::new("Already seated"));
        }
        let Some(opponent) = state.queue.pop_front() else {
            return Err(ActuationError::new("Nobody is waiting"));
        };
        state.queue.push_back(opponent.clone());
        info!(opponent = %opponent.display_name(), "Seated opponent");
        state.seated = Some(opponent);
        state.games_in_room = 0;
        state.deal();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn request_rematch(&self) -> Result<(), ActuationError> {
        let mut state = self.lock();
        let finished = state.board.is_some_and(|b| b.is_terminal());
        if !self.settings.rematch_available || state.seated.is_none() || !finished {
            return Err(ActuationError::new("Rematch button not found"));
        }
        state.stats.rematches += 1;
        state.deal();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn leave_room(&self) -> Result<(), ActuationError> {
        let mut state = self.lock();
        state.seated = None;
        state.board = None;
        state.round_over = None;
        state.stats.rooms_left += 1;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileOracle for SimulatedTable {
    async fn resolve_authoritative_name(&self, display_name: &str) -> Option<String> {
        self.lock().stats.profile_lookups += 1;
        tokio::time::sleep(self.settings.profile_settle).await;
        let state = self.lock();
        state
            .seated
            .as_ref()
            .filter(|o| o.display_name() == display_name)
            .map(|o| o.account_name().to_string())
    }

    async fn close_panel(&self) {
        self.lock().stats.panels_closed += 1;
    }
}

#[async_trait::async_trait]
impl LeaderboardProbe for SimulatedTable {
    async fn current_score(&self) -> Option<u32> {
        self.lock().score
    }
}
