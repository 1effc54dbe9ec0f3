//! Move selection: opening overlay first, then search.

use derive_getters::Getters;
use tracing::{debug, info, instrument};

use super::opening::opening_override;
use super::search::{SearchDepth, best_move};
use crate::games::tictactoe::{Board, Move};

/// Where a planned move came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum MoveSource {
    /// The scripted opening line.
    #[strum(to_string = "opening")]
    Opening,
    /// Minimax search.
    #[strum(to_string = "search")]
    Search,
}

/// Chooses the operator's moves.
#[derive(Debug, Clone, Copy, Getters)]
pub struct MovePlanner {
    opening_strategy: bool,
    depth: SearchDepth,
}

impl MovePlanner {
    /// Creates a planner.
    #[instrument]
    pub fn new(opening_strategy: bool, depth: SearchDepth) -> Self {
        Self {
            opening_strategy,
            depth,
        }
    }

    /// Picks a move for `board`, or `None` when the game is already over.
    #[instrument(skip(self, board), fields(board = %board))]
    pub fn plan(&self, board: &Board) -> Option<(Move, MoveSource)> {
        if board.is_terminal() {
            debug!("Board is terminal, nothing to plan");
            return None;
        }

        if self.opening_strategy
            && let Some(pos) = opening_override(board)
        {
            info!(position = %pos, "Opening strategy move");
            return Some((pos, MoveSource::Opening));
        }

        let pos = best_move(board, self.depth)?;
        info!(position = %pos, depth = ?self.depth, "Search move");
        Some((pos, MoveSource::Search))
    }
}

impl Default for MovePlanner {
    fn default() -> Self {
        Self::new(false, SearchDepth::Unbounded)
    }
}
