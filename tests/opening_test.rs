//! Tests for the scripted opening and its place in move planning.

use strictly_autopilot::{Board, MovePlanner, MoveSource, Position, SearchDepth, opening_override};

#[test]
fn test_empty_board_takes_center() {
    assert_eq!(opening_override(&Board::new()), Some(Position::Center));
}

#[test]
fn test_corner_answered_with_opposite_corner() {
    let board: Board = "___/_M_/T__".parse().unwrap();
    let reply = opening_override(&board).unwrap();
    assert_eq!(reply, Position::TopRight);
    assert_eq!((reply.row(), reply.col()), (0, 2));
}

#[test]
fn test_every_corner_mirrors() {
    for (theirs, expected) in [
        ("T__/_M_/___", Position::BottomRight),
        ("__T/_M_/___", Position::BottomLeft),
        ("___/_M_/__T", Position::TopLeft),
    ] {
        let board: Board = theirs.parse().unwrap();
        assert_eq!(opening_override(&board), Some(expected), "{}", theirs);
    }
}

#[test]
fn test_later_positions_defer() {
    let board: Board = "T_M/_M_/T__".parse().unwrap();
    assert_eq!(opening_override(&board), None);
}

#[test]
fn test_planner_uses_opening_only_when_enabled() {
    let board = Board::new();
    let with_opening = MovePlanner::new(true, SearchDepth::Unbounded);
    let search_only = MovePlanner::new(false, SearchDepth::Unbounded);

    assert_eq!(with_opening.plan(&board), Some((Position::Center, MoveSource::Opening)));
    assert_eq!(search_only.plan(&board), Some((Position::TopLeft, MoveSource::Search)));
}

#[test]
fn test_planner_falls_back_to_search() {
    let board: Board = "TT_/_M_/___".parse().unwrap();
    let planner = MovePlanner::new(true, SearchDepth::Unbounded);
    assert_eq!(planner.plan(&board), Some((Position::TopRight, MoveSource::Search)));
}

#[test]
fn test_planner_skips_finished_games() {
    let board: Board = "MMM/TT_/___".parse().unwrap();
    assert_eq!(MovePlanner::default().plan(&board), None);
}
