//! Fixed opening line: take the center, then answer a corner with the
//! opposite corner.

use tracing::{debug, instrument};

use crate::games::tictactoe::{Board, Cell, Mark, Move, Position};

/// Returns the scripted opening move for `board`, or `None` to defer to search.
///
/// - Empty board (operator moves first): the center.
/// - Operator holds the center and the opponent's only mark is a corner:
///   the diagonally opposite corner.
#[instrument(skip(board), fields(board = %board))]
pub fn opening_override(board: &Board) -> Option<Move> {
    match board.marks_placed() {
        0 => {
            debug!("Opening: taking the center");
            Some(Position::Center)
        }
        2 if board.get(Position::Center) == Cell::Mine => {
            let corner = Position::CORNERS
                .into_iter()
                .find(|pos| board.get(*pos) == Cell::Theirs)?;
            if board.count(Mark::Theirs) != 1 {
                return None;
            }
            let reply = corner.opposite_corner().filter(|pos| board.is_empty(*pos))?;
            debug!(opponent_corner = %corner, reply = %reply, "Opening: mirroring corner");
            Some(reply)
        }
        _ => None,
    }
}
