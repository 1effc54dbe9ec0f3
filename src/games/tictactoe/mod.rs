//! Tic-tac-toe board model seen from the operator's side.

mod position;
pub mod rules;
mod types;

pub use position::Position;
pub use types::{Board, BoardError, Cell, Mark, Symbol};

/// A move is the cell it marks; the engine always moves for [`Mark::Mine`].
pub type Move = Position;
