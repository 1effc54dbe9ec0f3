//! Continuation policy and result detection.

use tracing::{debug, info, instrument, warn};

use super::phase::{Continuation, GameOutcome, StopReason};
use crate::classifier::Verdict;
use crate::games::tictactoe::rules::is_draw;
use crate::games::tictactoe::Board;
use crate::ledger::SessionLedger;

/// Decides what follows a finished game, reading the ledger as it stands.
///
/// Checks run in priority order: loss cap, leaderboard target, then the
/// per-verdict game cap. An unclassified opponent is treated as human.
#[instrument(skip(ledger), fields(
    total_losses = *ledger.total_losses(),
    games = *ledger.games_with_current_opponent(),
    verdict = ?ledger.current_verdict(),
))]
pub fn decide_continuation(ledger: &SessionLedger, leaderboard_score: Option<u32>) -> Continuation {
    let config = ledger.config();

    if ledger.total_losses() >= config.max_losses() {
        info!("Loss cap reached");
        return Continuation::Stop(StopReason::LossLimit);
    }

    if let Some(score) = leaderboard_target_hit(ledger, leaderboard_score) {
        info!(score, "Leaderboard target reached");
        return Continuation::Stop(StopReason::LeaderboardTarget);
    }

    let is_bot = *ledger.current_verdict() == Some(Verdict::Bot);
    let cap = config.games_cap(is_bot);
    let decision = if *ledger.games_with_current_opponent() < cap {
        Continuation::Rematch
    } else {
        Continuation::Rotate
    };
    debug!(is_bot, cap, decision = ?decision, "Continuation decided");
    decision
}

/// Returns the score when leaderboard checking is enabled and `score` meets
/// the configured stop score.
pub fn leaderboard_target_hit(ledger: &SessionLedger, score: Option<u32>) -> Option<u32> {
    let config = ledger.config();
    if !*config.leaderboard_check_enabled() {
        return None;
    }
    score.filter(|s| s >= config.leaderboard_stop_score())
}

/// Result of a terminal board; `None` while the game is still open.
pub fn outcome_from_board(board: &Board) -> Option<GameOutcome> {
    match board.evaluate() {
        score if score > 0 => Some(GameOutcome::Win),
        score if score < 0 => Some(GameOutcome::Loss),
        _ if is_draw(board) => Some(GameOutcome::Draw),
        _ => None,
    }
}

/// Result read from an end-of-round banner.
///
/// Text that names no result counts as a loss.
#[instrument]
pub fn outcome_from_round_text(text: &str) -> GameOutcome {
    let lower = text.to_lowercase();
    if lower.contains("you win") || lower.contains("victory") {
        GameOutcome::Win
    } else if lower.contains("you lose") || lower.contains("defeat") {
        GameOutcome::Loss
    } else if lower.contains("draw") || lower.contains("tie") {
        GameOutcome::Draw
    } else {
        warn!(text, "Unrecognised round-over text, counting as loss");
        GameOutcome::Loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutopilotConfig;
    use chrono::Utc;

    fn ledger_with(config: AutopilotConfig) -> SessionLedger {
        SessionLedger::new(config, Utc::now())
    }

    #[test]
    fn test_loss_cap_beats_everything() {
        let mut ledger = ledger_with(AutopilotConfig::default().with_max_losses(2));
        ledger.set_total_losses(2);
        ledger.set_current_verdict(Some(Verdict::Bot));
        assert_eq!(
            decide_continuation(&ledger, None),
            Continuation::Stop(StopReason::LossLimit)
        );
    }

    #[test]
    fn test_bot_cap_boundary() {
        let mut ledger = ledger_with(AutopilotConfig::default());
        ledger.set_current_verdict(Some(Verdict::Bot));
        ledger.set_games_with_current_opponent(6);
        assert_eq!(decide_continuation(&ledger, None), Continuation::Rematch);
        ledger.set_games_with_current_opponent(7);
        assert_eq!(decide_continuation(&ledger, None), Continuation::Rotate);
    }

    #[test]
    fn test_pending_verdict_counts_as_human() {
        let mut ledger = ledger_with(AutopilotConfig::default());
        ledger.set_games_with_current_opponent(1);
        assert_eq!(decide_continuation(&ledger, None), Continuation::Rotate);
    }

    #[test]
    fn test_leaderboard_only_when_enabled() {
        let mut ledger = ledger_with(AutopilotConfig::default());
        assert_eq!(decide_continuation(&ledger, Some(20_000)), Continuation::Rematch);
        ledger.set_config(AutopilotConfig::default().with_leaderboard_check_enabled(true));
        assert_eq!(
            decide_continuation(&ledger, Some(16_000)),
            Continuation::Stop(StopReason::LeaderboardTarget)
        );
        assert_eq!(decide_continuation(&ledger, Some(15_999)), Continuation::Rematch);
    }

    #[test]
    fn test_board_outcomes() {
        assert_eq!(outcome_from_board(&"MMM/TT_/___".parse().unwrap()), Some(GameOutcome::Win));
        assert_eq!(outcome_from_board(&"TTT/MM_/M__".parse().unwrap()), Some(GameOutcome::Loss));
        assert_eq!(outcome_from_board(&"MTM/MTT/TMM".parse().unwrap()), Some(GameOutcome::Draw));
        assert_eq!(outcome_from_board(&"M__/_T_/___".parse().unwrap()), None);
    }

    #[test]
    fn test_round_text() {
        assert_eq!(outcome_from_round_text("You win!"), GameOutcome::Win);
        assert_eq!(outcome_from_round_text("Defeat"), GameOutcome::Loss);
        assert_eq!(outcome_from_round_text("It's a tie"), GameOutcome::Draw);
        assert_eq!(outcome_from_round_text("Play again?"), GameOutcome::Loss);
    }
}
