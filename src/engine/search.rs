//! Depth-limited minimax over the 3x3 board.
//!
//! The operator ([`Mark::Mine`]) is always the maximizing side. Terminal
//! positions score `10 - depth` for an operator win and `depth - 10` for
//! an opponent win, so faster wins and slower losses are preferred. A
//! depth cutoff scores the position statically with the same discount
//! (0 when nobody has a line).

use tracing::{debug, instrument};

use crate::games::tictactoe::{Board, Cell, Mark, Move};

const WIN_SCORE: i32 = 10;

/// How deep the search may recurse below the candidate move.
///
/// `Unbounded` is perfect play; small limits make the engine
/// deliberately short-sighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDepth {
    /// Search to the end of the game.
    #[default]
    Unbounded,
    /// Stop after this many plies below the candidate move.
    Limited(u32),
}

impl SearchDepth {
    /// Builds a depth from an optional configured limit.
    pub fn from_limit(limit: Option<u32>) -> Self {
        match limit {
            Some(plies) => SearchDepth::Limited(plies),
            None => SearchDepth::Unbounded,
        }
    }

    fn reached(self, depth: u32) -> bool {
        match self {
            SearchDepth::Unbounded => false,
            SearchDepth::Limited(max) => depth >= max,
        }
    }
}

/// Scores a board at `depth` plies below the candidate move.
fn score_at(board: &Board, depth: u32) -> Option<i32> {
    let depth = depth as i32;
    match board.winner() {
        Some(Mark::Mine) => Some(WIN_SCORE - depth),
        Some(Mark::Theirs) => Some(depth - WIN_SCORE),
        None if !board.has_moves_left() => Some(0),
        None => None,
    }
}

/// Minimax value of `board` with `to_move` about to play.
///
/// Places and removes marks on the local copy only.
fn minimax(board: &mut Board, depth: u32, to_move: Mark, limit: SearchDepth) -> i32 {
    if let Some(score) = score_at(board, depth) {
        return score;
    }
    if limit.reached(depth) {
        return 0;
    }

    let maximizing = to_move == Mark::Mine;
    let mut best = if maximizing { i32::MIN } else { i32::MAX };
    let empties: Vec<Move> = board.empty_positions().collect();
    for pos in empties {
        board.set(pos, to_move.cell());
        let value = minimax(board, depth + 1, to_move.opponent(), limit);
        board.set(pos, Cell::Empty);
        best = if maximizing {
            best.max(value)
        } else {
            best.min(value)
        };
    }
    best
}

/// Scores every legal move for the operator, in row-major order.
#[instrument(skip(board), fields(board = %board))]
pub fn score_moves(board: &Board, limit: SearchDepth) -> Vec<(Move, i32)> {
    let mut scratch = *board;
    let empties: Vec<Move> = board.empty_positions().collect();
    empties
        .into_iter()
        .map(|pos| {
            scratch.set(pos, Mark::Mine.cell());
            let value = minimax(&mut scratch, 0, Mark::Theirs, limit);
            scratch.set(pos, Cell::Empty);
            (pos, value)
        })
        .collect()
}

/// Chooses the operator's move on `board`.
///
/// Ties go to the first move in row-major order. Returns `None` when the
/// board has no empty cell; callers are expected to check
/// [`Board::has_moves_left`] first.
#[instrument(skip(board), fields(board = %board))]
pub fn best_move(board: &Board, limit: SearchDepth) -> Option<Move> {
    let mut best: Option<(Move, i32)> = None;
    for (pos, value) in score_moves(board, limit) {
        if best.is_none_or(|(_, best_value)| value > best_value) {
            best = Some((pos, value));
        }
    }
    debug!(chosen = ?best, "Search complete");
    best.map(|(pos, _)| pos)
}
