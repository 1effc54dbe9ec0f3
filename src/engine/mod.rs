//! Move decision engine.

mod opening;
mod planner;
mod search;

pub use opening::opening_override;
pub use planner::{MovePlanner, MoveSource};
pub use search::{SearchDepth, best_move, score_moves};
