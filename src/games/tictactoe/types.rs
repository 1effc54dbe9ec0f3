//! Core domain types for tic-tac-toe, seen from the operator's side of the table.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

use super::position::Position;
use super::rules;

/// The symbol a seat draws on the board.
///
/// The site assigns X or O per game; the operator may hold either one
/// against the same opponent across consecutive episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Symbol {
    /// Player X (goes first).
    X,
    /// Player O (goes second).
    O,
}

impl Symbol {
    /// Returns the other symbol.
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// Whose mark a non-empty cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// The operator (maximizing side).
    Mine,
    /// The opponent.
    Theirs,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::Mine => Mark::Theirs,
            Mark::Theirs => Mark::Mine,
        }
    }

    /// The cell value this mark produces.
    pub fn cell(self) -> Cell {
        match self {
            Mark::Mine => Cell::Mine,
            Mark::Theirs => Cell::Theirs,
        }
    }
}

/// A single cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    /// Empty cell.
    #[default]
    Empty,
    /// Holds the operator's mark.
    Mine,
    /// Holds the opponent's mark.
    Theirs,
}

impl Cell {
    /// Returns the mark in this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::Mine => Some(Mark::Mine),
            Cell::Theirs => Some(Mark::Theirs),
        }
    }

    fn to_char(self) -> char {
        match self {
            Cell::Empty => '_',
            Cell::Mine => 'M',
            Cell::Theirs => 'T',
        }
    }
}

/// 3x3 board from the operator's point of view.
///
/// A board is a plain value: the sensor builds a fresh one every tick and
/// the engine never mutates a caller's copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board {
    /// Cells in row-major order (0-8).
    cells: [Cell; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a board from row-major cells.
    pub fn from_cells(cells: [Cell; 9]) -> Self {
        Self { cells }
    }

    /// Creates a board from a grid of sensed symbols.
    ///
    /// Cells holding `mine` become [`Cell::Mine`], the other symbol
    /// becomes [`Cell::Theirs`].
    #[instrument(skip(grid))]
    pub fn from_symbols(grid: [[Option<Symbol>; 3]; 3], mine: Symbol) -> Self {
        let mut cells = [Cell::Empty; 9];
        for (row, line) in grid.iter().enumerate() {
            for (col, symbol) in line.iter().enumerate() {
                cells[row * 3 + col] = match symbol {
                    None => Cell::Empty,
                    Some(s) if *s == mine => Cell::Mine,
                    Some(_) => Cell::Theirs,
                };
            }
        }
        Self { cells }
    }

    /// Gets the cell at the given position.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.to_index()]
    }

    /// Sets the cell at the given position without checks.
    pub(crate) fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.to_index()] = cell;
    }

    /// Places `mark` on an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] when the cell is already occupied.
    #[instrument(skip(self))]
    pub fn place(&mut self, pos: Position, mark: Mark) -> Result<(), BoardError> {
        if !self.is_empty(pos) {
            return Err(BoardError::new(format!("{} is already occupied", pos)));
        }
        self.set(pos, mark.cell());
        Ok(())
    }

    /// Returns a copy with `mark` placed at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] when the cell is already occupied.
    pub fn with(&self, pos: Position, mark: Mark) -> Result<Self, BoardError> {
        let mut next = *self;
        next.place(pos, mark)?;
        Ok(next)
    }

    /// Checks if a cell is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos) == Cell::Empty
    }

    /// Returns all cells as a slice.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// Empty positions in row-major order.
    pub fn empty_positions(&self) -> impl Iterator<Item = Position> + '_ {
        Position::ALL.into_iter().filter(|pos| self.is_empty(*pos))
    }

    /// Number of cells holding `mark`.
    pub fn count(&self, mark: Mark) -> usize {
        self.cells.iter().filter(|c| **c == mark.cell()).count()
    }

    /// Number of occupied cells.
    pub fn marks_placed(&self) -> usize {
        self.cells.iter().filter(|c| **c != Cell::Empty).count()
    }

    /// True while at least one cell is empty.
    pub fn has_moves_left(&self) -> bool {
        self.cells.contains(&Cell::Empty)
    }

    /// The mark with three in a row, if any.
    pub fn winner(&self) -> Option<Mark> {
        rules::check_winner(self)
    }

    /// True when someone has three in a row or the board is full.
    pub fn is_terminal(&self) -> bool {
        self.winner().is_some() || !self.has_moves_left()
    }

    /// Static evaluation: +10 when the operator has a line, -10 when the
    /// opponent does, 0 otherwise.
    pub fn evaluate(&self) -> i32 {
        match self.winner() {
            Some(Mark::Mine) => 10,
            Some(Mark::Theirs) => -10,
            None => 0,
        }
    }

    /// Checks the alternating-turn invariant: mark counts differ by at most one.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError`] describing the imbalance.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), BoardError> {
        let mine = self.count(Mark::Mine);
        let theirs = self.count(Mark::Theirs);
        if mine.abs_diff(theirs) > 1 {
            return Err(BoardError::new(format!(
                "Inconsistent board: {} own marks vs {} opponent marks",
                mine, theirs
            )));
        }
        Ok(())
    }

    /// The same position seen from the opponent's side.
    pub fn flipped(&self) -> Self {
        let mut cells = self.cells;
        for cell in cells.iter_mut() {
            *cell = match *cell {
                Cell::Empty => Cell::Empty,
                Cell::Mine => Cell::Theirs,
                Cell::Theirs => Cell::Mine,
            };
        }
        Self { cells }
    }

    /// Formats the board as three rows separated by `/` (e.g. `MM_/_T_/___`).
    pub fn display(&self) -> String {
        self.cells
            .chunks(3)
            .map(|row| row.iter().map(|c| c.to_char()).collect::<String>())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

impl FromStr for Board {
    type Err = BoardError;

    /// Parses `M` (mine), `T` (theirs) and `_` or `.` (empty); `/`, `|`
    /// and whitespace are ignored as row separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = Vec::with_capacity(9);
        for ch in s.chars() {
            match ch {
                'M' | 'm' => cells.push(Cell::Mine),
                'T' | 't' => cells.push(Cell::Theirs),
                '_' | '.' => cells.push(Cell::Empty),
                '/' | '|' => {}
                c if c.is_whitespace() => {}
                other => {
                    return Err(BoardError::new(format!("Unexpected board character '{}'", other)));
                }
            }
        }
        let cells: [Cell; 9] = cells.try_into().map_err(|v: Vec<Cell>| {
            BoardError::new(format!("Expected 9 cells, found {}", v.len()))
        })?;
        Ok(Self { cells })
    }
}

/// Board error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Board error: {} at {}:{}", message, file, line)]
pub struct BoardError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl BoardError {
    /// Creates a new board error with caller location tracking.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_agree() {
        let board: Board = "MM_/_T_/T__".parse().unwrap();
        assert_eq!(board.display(), "MM_/_T_/T__");
        assert_eq!(board.get(Position::TopLeft), Cell::Mine);
        assert_eq!(board.get(Position::Center), Cell::Theirs);
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert!("MM_/___".parse::<Board>().is_err());
    }

    #[test]
    fn test_from_symbols_maps_by_assignment() {
        let grid = [
            [Some(Symbol::X), None, None],
            [None, Some(Symbol::O), None],
            [None, None, None],
        ];
        let as_o = Board::from_symbols(grid, Symbol::O);
        assert_eq!(as_o.get(Position::TopLeft), Cell::Theirs);
        assert_eq!(as_o.get(Position::Center), Cell::Mine);
        assert_eq!(Board::from_symbols(grid, Symbol::X), as_o.flipped());
    }

    #[test]
    fn test_validate_rejects_imbalanced_counts() {
        let board: Board = "MM_/___/___".parse().unwrap();
        assert!(board.validate().is_err());
        let board: Board = "MM_/T__/___".parse().unwrap();
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_place_rejects_occupied_cell() {
        let mut board = Board::new();
        board.place(Position::Center, Mark::Mine).unwrap();
        assert!(board.place(Position::Center, Mark::Theirs).is_err());
    }

    #[test]
    fn test_terminal_on_full_board_without_winner() {
        let board: Board = "MTM/MTT/TMM".parse().unwrap();
        assert_eq!(board.winner(), None);
        assert!(board.is_terminal());
        assert_eq!(board.evaluate(), 0);
    }
}
