//! Game rules for tic-tac-toe.
//!
//! Pure functions over [`Board`](super::Board), kept apart from board
//! storage so the search engine and the episode policy share one
//! definition of "won" and "over".

pub mod draw;
pub mod win;

pub use draw::{is_draw, is_full};
pub use win::{LINES, check_winner};
