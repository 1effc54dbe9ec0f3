//! Session ledger: everything the autopilot remembers between games and
//! across restarts.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::ring::RingBuffer;
use crate::classifier::{DetectionRecord, KnownBotRegistry, OpponentIdentity, Signals, Verdict};
use crate::config::AutopilotConfig;
use crate::episode::{GameOutcome, GameRecord, StopReason};

/// Detection records at or above this confidence count as accurate.
const ACCURATE_CONFIDENCE: f64 = 0.6;

/// Running counters, histories and configuration for one autopilot session.
///
/// Only the episode state machine mutates a live ledger; the user-facing
/// resets below are applied between ticks.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct SessionLedger {
    config: AutopilotConfig,
    registry: KnownBotRegistry,
    total_losses: u32,
    games_with_current_opponent: u32,
    opponent_game_counts: BTreeMap<String, u32>,
    session_start: DateTime<Utc>,
    auto_play_enabled: bool,
    current_opponent: Option<OpponentIdentity>,
    current_verdict: Option<Verdict>,
    stop_reason: Option<StopReason>,
    detection_history: RingBuffer<DetectionRecord>,
    move_times: RingBuffer<u64>,
    game_history: RingBuffer<GameRecord>,
}

impl SessionLedger {
    /// Creates a fresh ledger with auto-play disabled and a seeded registry.
    #[instrument(skip(config))]
    pub fn new(config: AutopilotConfig, now: DateTime<Utc>) -> Self {
        Self {
            detection_history: RingBuffer::with_capacity(*config.detection_history_capacity()),
            move_times: RingBuffer::with_capacity(*config.move_time_capacity()),
            game_history: RingBuffer::with_capacity(*config.game_history_capacity()),
            config,
            registry: KnownBotRegistry::default(),
            total_losses: 0,
            games_with_current_opponent: 0,
            opponent_game_counts: BTreeMap::new(),
            session_start: now,
            auto_play_enabled: false,
            current_opponent: None,
            current_verdict: None,
            stop_reason: None,
        }
    }

    /// Replaces the configuration, resizing the bounded histories.
    #[instrument(skip(self, config))]
    pub fn set_config(&mut self, config: AutopilotConfig) {
        self.config = config;
        self.apply_capacities();
        debug!("Ledger configuration replaced");
    }

    /// Resizes the bounded histories to the configured capacities.
    ///
    /// Loaded ledgers call this so capacities edited in the file take effect.
    pub fn apply_capacities(&mut self) {
        self.detection_history.resize(*self.config.detection_history_capacity());
        self.move_times.resize(*self.config.move_time_capacity());
        self.game_history.resize(*self.config.game_history_capacity());
    }

    /// Mutable access to the known-bot registry for manual edits.
    pub fn registry_mut(&mut self) -> &mut KnownBotRegistry {
        &mut self.registry
    }

    /// Enables or disables auto-play. Enabling clears any stop reason.
    #[instrument(skip(self))]
    pub fn set_auto_play(&mut self, enabled: bool) {
        self.auto_play_enabled = enabled;
        if enabled {
            self.stop_reason = None;
        }
        info!(enabled, "Auto-play toggled");
    }

    /// Re-enables auto-play. Resuming after a duration stop restarts the
    /// session clock.
    #[instrument(skip(self))]
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if self.stop_reason == Some(StopReason::SessionDuration) {
            self.restart_session(now);
        }
        self.set_auto_play(true);
    }

    /// Disables auto-play, remembering why.
    #[instrument(skip(self))]
    pub fn stop(&mut self, reason: StopReason) {
        self.auto_play_enabled = false;
        self.stop_reason = Some(reason);
        info!(reason = %reason, "Auto-play stopped");
    }

    /// Restarts the session clock (used when re-arming after a duration stop).
    #[instrument(skip(self))]
    pub fn restart_session(&mut self, now: DateTime<Utc>) {
        self.session_start = now;
    }

    /// Clears the loss counter.
    #[instrument(skip(self))]
    pub fn reset_losses(&mut self) {
        info!(previous = self.total_losses, "Loss counter reset");
        self.total_losses = 0;
    }

    /// Clears per-opponent game counts, including the current opponent's.
    #[instrument(skip(self))]
    pub fn reset_opponent_counts(&mut self) {
        self.opponent_game_counts.clear();
        self.games_with_current_opponent = 0;
        info!("Per-opponent game counts reset");
    }

    /// Sets the opponent currently being played.
    pub fn set_current_opponent(&mut self, opponent: Option<OpponentIdentity>) {
        self.current_opponent = opponent;
    }

    /// Sets the latest verdict for the current opponent.
    pub fn set_current_verdict(&mut self, verdict: Option<Verdict>) {
        self.current_verdict = verdict;
    }

    /// Forgets the current opponent entirely (rotation or emergency stop).
    #[instrument(skip(self))]
    pub(crate) fn clear_opponent(&mut self) {
        self.games_with_current_opponent = 0;
        self.current_opponent = None;
        self.current_verdict = None;
        self.move_times.clear();
    }

    /// Appends a classification result.
    pub(crate) fn record_detection(&mut self, record: DetectionRecord) {
        self.detection_history.push(record);
    }

    /// Appends an opponent reply time.
    pub(crate) fn record_response_time(&mut self, ms: u64) {
        self.move_times.push(ms);
    }

    /// Applies a finished game: per-opponent counters, loss counter, history.
    #[instrument(
        skip(self, record),
        fields(outcome = %record.outcome(), opponent = %record.opponent())
    )]
    pub(crate) fn record_game(&mut self, record: GameRecord) {
        self.games_with_current_opponent += 1;
        *self
            .opponent_game_counts
            .entry(record.opponent().clone())
            .or_insert(0) += 1;
        if *record.outcome() == GameOutcome::Loss {
            self.total_losses += 1;
        }
        self.game_history.push(record);
        debug!(
            games_with_current_opponent = self.games_with_current_opponent,
            total_losses = self.total_losses,
            "Game recorded"
        );
    }

    /// Sets the games-with-current-opponent counter directly.
    pub fn set_games_with_current_opponent(&mut self, games: u32) {
        self.games_with_current_opponent = games;
    }

    /// Sets the loss counter directly.
    pub fn set_total_losses(&mut self, losses: u32) {
        self.total_losses = losses;
    }

    /// Classifier inputs from the stored reply times.
    pub fn signals(&self) -> Signals {
        Signals::new(self.move_times.latest().copied(), self.move_times.to_vec())
    }

    /// Games played against `name` this session.
    pub fn games_against(&self, name: &str) -> u32 {
        self.opponent_game_counts.get(name).copied().unwrap_or(0)
    }

    /// Time since the session started.
    pub fn session_elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.session_start).to_std().unwrap_or(Duration::ZERO)
    }

    /// Session runtime as `"{h}h {m}m"`.
    pub fn runtime(&self, now: DateTime<Utc>) -> String {
        let secs = self.session_elapsed(now).as_secs();
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }

    /// Percentage of recorded games won, rounded.
    pub fn win_rate(&self) -> u32 {
        if self.game_history.is_empty() {
            return 0;
        }
        let wins = self
            .game_history
            .iter()
            .filter(|r| *r.outcome() == GameOutcome::Win)
            .count();
        ((wins as f64 / self.game_history.len() as f64) * 100.0).round() as u32
    }

    /// Percentage of detections made with confidence above 0.6; 100 with
    /// fewer than two detections.
    pub fn detection_accuracy(&self) -> u32 {
        if self.detection_history.len() < 2 {
            return 100;
        }
        let accurate = self
            .detection_history
            .iter()
            .filter(|r| *r.confidence() > ACCURATE_CONFIDENCE)
            .count();
        ((accurate as f64 / self.detection_history.len() as f64) * 100.0).round() as u32
    }
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::new(AutopilotConfig::default(), Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::Episode;
    use chrono::Duration as ChronoDuration;

    fn finished(name: &str, outcome: GameOutcome, now: DateTime<Utc>) -> GameRecord {
        let mut episode = Episode::start(OpponentIdentity::from_display(name), None, now);
        episode.finish(outcome, now + ChronoDuration::seconds(30));
        GameRecord::from_episode(&episode, Some(Verdict::Human), now)
    }

    #[test]
    fn test_record_game_updates_counters() {
        let now = Utc::now();
        let mut ledger = SessionLedger::new(AutopilotConfig::default(), now);
        ledger.record_game(finished("Marcus", GameOutcome::Loss, now));
        ledger.record_game(finished("Marcus", GameOutcome::Win, now));
        assert_eq!(*ledger.total_losses(), 1);
        assert_eq!(*ledger.games_with_current_opponent(), 2);
        assert_eq!(ledger.games_against("Marcus"), 2);
        assert_eq!(ledger.win_rate(), 50);
        assert_eq!(*ledger.game_history().latest().unwrap().duration_ms(), 30_000);
    }

    #[test]
    fn test_resets() {
        let now = Utc::now();
        let mut ledger = SessionLedger::new(AutopilotConfig::default(), now);
        ledger.record_game(finished("Marcus", GameOutcome::Loss, now));
        ledger.reset_losses();
        ledger.reset_opponent_counts();
        assert_eq!(*ledger.total_losses(), 0);
        assert_eq!(*ledger.games_with_current_opponent(), 0);
        assert_eq!(ledger.games_against("Marcus"), 0);
        assert_eq!(ledger.game_history().len(), 1);
    }

    #[test]
    fn test_runtime_format() {
        let start = Utc::now();
        let ledger = SessionLedger::new(AutopilotConfig::default(), start);
        let later = start + ChronoDuration::minutes(125);
        assert_eq!(ledger.runtime(later), "2h 5m");
    }

    #[test]
    fn test_detection_accuracy_needs_two_records() {
        let ledger = SessionLedger::default();
        assert_eq!(ledger.detection_accuracy(), 100);
    }

    #[test]
    fn test_resume_after_duration_stop_restarts_clock() {
        let start = Utc::now();
        let mut ledger = SessionLedger::new(AutopilotConfig::default(), start);
        ledger.stop(StopReason::SessionDuration);
        let later = start + ChronoDuration::hours(25);
        ledger.resume(later);
        assert!(*ledger.auto_play_enabled());
        assert_eq!(*ledger.stop_reason(), None);
        assert_eq!(*ledger.session_start(), later);
    }

    #[test]
    fn test_set_config_shrinks_histories() {
        let now = Utc::now();
        let mut ledger = SessionLedger::new(AutopilotConfig::default(), now);
        for ms in [100, 200, 300] {
            ledger.record_response_time(ms);
        }
        ledger.set_config(AutopilotConfig::default().with_move_time_capacity(2));
        assert_eq!(ledger.signals().move_times_ms(), &vec![200, 300]);
        assert_eq!(*ledger.signals().response_time_ms(), Some(300));
    }
}
