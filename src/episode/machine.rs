//! The episode state machine: one tick at a time, driven by sensor reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use super::phase::{Continuation, Episode, GameOutcome, GameRecord, Phase, StopReason};
use super::policy::{
    decide_continuation, leaderboard_target_hit, outcome_from_board, outcome_from_round_text,
};
use crate::classifier::{OpponentClassifier, OpponentIdentity, same_name};
use crate::collaborators::{Collaborators, SensorReading};
use crate::engine::{MovePlanner, MoveSource};
use crate::games::tictactoe::{Board, Position};
use crate::ledger::{MoveTimer, SessionLedger};
use crate::notify::Notification;
use crate::poll::{PollOutcome, poll_or_fallback};
use crate::store::LedgerStore;

/// Display name used when the sensor cannot read one.
const UNKNOWN_OPPONENT: &str = "Unknown";

/// Shared flag for stopping the machine from outside the tick loop.
///
/// Requests take effect at the top of the next tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Creates an unset handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests an emergency stop.
    #[instrument(skip(self))]
    pub fn request(&self) {
        info!("Emergency stop requested");
        self.requested.store(true, Ordering::SeqCst);
    }

    /// True while a stop is pending.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Auto-play is disabled; nothing happened.
    Disabled,
    /// Nothing to do this tick.
    Waiting,
    /// Matchmaking was requested.
    Matchmaking,
    /// A new episode began.
    Started,
    /// A mark was placed.
    Moved(Position, MoveSource),
    /// An episode ended and its continuation was carried out.
    Finished {
        /// Result of the episode.
        outcome: GameOutcome,
        /// What happened next.
        continuation: Continuation,
    },
    /// A guard stopped auto-play.
    Stopped(StopReason),
}

/// Owns the ledger and classifier and advances play one tick at a time.
pub struct EpisodeMachine {
    phase: Phase,
    ledger: SessionLedger,
    classifier: OpponentClassifier,
    episode: Option<Episode>,
    timer: MoveTimer,
    last_acted: Option<Board>,
    waiting_ticks: u32,
    awaiting_rematch: bool,
    episodes_completed: u64,
    consecutive_errors: u32,
    tick_failed: bool,
    collaborators: Collaborators,
    store: Option<Arc<dyn LedgerStore>>,
    stop: StopHandle,
}

impl std::fmt::Debug for EpisodeMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeMachine")
            .field("phase", &self.phase)
            .field("episode", &self.episode)
            .field("episodes_completed", &self.episodes_completed)
            .finish_non_exhaustive()
    }
}

impl EpisodeMachine {
    /// Creates a machine in [`Phase::Idle`] around an existing ledger.
    #[instrument(skip(ledger, collaborators, store))]
    pub fn new(
        ledger: SessionLedger,
        collaborators: Collaborators,
        store: Option<Arc<dyn LedgerStore>>,
    ) -> Self {
        Self {
            phase: Phase::Idle,
            ledger,
            classifier: OpponentClassifier::new(),
            episode: None,
            timer: MoveTimer::new(),
            last_acted: None,
            waiting_ticks: 0,
            awaiting_rematch: false,
            episodes_completed: 0,
            consecutive_errors: 0,
            tick_failed: false,
            collaborators,
            store,
            stop: StopHandle::new(),
        }
    }

    /// Shares `stop` with this machine instead of its own handle.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The session ledger.
    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    /// Mutable ledger access for manual edits between ticks.
    pub fn ledger_mut(&mut self) -> &mut SessionLedger {
        &mut self.ledger
    }

    /// The open episode, if any.
    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    /// Episodes finished since this machine was created.
    pub fn episodes_completed(&self) -> u64 {
        self.episodes_completed
    }

    /// A handle that requests an emergency stop on the next tick.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Enables auto-play. Re-arming after a duration stop restarts the
    /// session clock.
    #[instrument(skip(self))]
    pub async fn enable(&mut self, now: DateTime<Utc>) {
        self.consecutive_errors = 0;
        self.ledger.resume(now);
        self.persist().await;
    }

    /// Failed ticks in a row since the last clean one.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Advances the machine by one polling tick.
    ///
    /// A tick whose sensing or actuation failed counts toward safe mode;
    /// a clean tick resets the count.
    #[instrument(skip(self), fields(phase = %self.phase))]
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        self.tick_failed = false;
        let outcome = self.step(now).await;
        if !self.tick_failed {
            self.consecutive_errors = 0;
            return outcome;
        }

        self.consecutive_errors += 1;
        let limit = *self.ledger.config().max_consecutive_errors();
        debug!(errors = self.consecutive_errors, limit, "Tick failed");
        if self.consecutive_errors < limit || !*self.ledger.auto_play_enabled() {
            return outcome;
        }

        let errors = self.consecutive_errors;
        self.consecutive_errors = 0;
        warn!(errors, "Too many consecutive errors, entering safe mode");
        self.halt(StopReason::SafeMode, Notification::SafeModeEnabled { errors }).await;
        TickOutcome::Stopped(StopReason::SafeMode)
    }

    async fn step(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.stop.is_requested() {
            self.emergency_stop().await;
            return TickOutcome::Stopped(StopReason::Manual);
        }

        if !*self.ledger.auto_play_enabled() {
            self.phase = Phase::Idle;
            return TickOutcome::Disabled;
        }

        let config = self.ledger.config();
        if *config.session_limit_enabled() {
            let elapsed = self.ledger.session_elapsed(now);
            if elapsed >= config.session_limit() {
                let notification = Notification::SessionDurationReached {
                    elapsed_secs: elapsed.as_secs(),
                };
                self.halt(StopReason::SessionDuration, notification).await;
                return TickOutcome::Stopped(StopReason::SessionDuration);
            }
        }

        let reading = match self.collaborators.sensor().read().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "Board read failed, retrying next tick");
                self.tick_failed = true;
                return TickOutcome::Waiting;
            }
        };

        if let Some(r) = &reading
            && let Err(e) = r.board().validate()
        {
            warn!(error = %e, board = %r.board(), "Skipping inconsistent board");
            self.tick_failed = true;
            return TickOutcome::Waiting;
        }

        match self.phase {
            Phase::Idle => match reading {
                Some(r) if is_live(&r) => {
                    self.phase = Phase::Matchmaking;
                    if !self.start_episode(&r, now).await {
                        return TickOutcome::Stopped(StopReason::Manual);
                    }
                    self.play(&r, now).await.unwrap_or(TickOutcome::Started)
                }
                _ => self.begin_matchmaking().await,
            },
            Phase::Matchmaking => match reading {
                Some(r) if is_live(&r) => {
                    if !self.start_episode(&r, now).await {
                        return TickOutcome::Stopped(StopReason::Manual);
                    }
                    self.play(&r, now).await.unwrap_or(TickOutcome::Started)
                }
                _ => self.matchmaking_watchdog().await,
            },
            Phase::InProgress => match reading {
                Some(r) => {
                    if let Some(outcome) = ended_outcome(&r) {
                        return self.finish_episode(outcome, now).await;
                    }
                    self.waiting_ticks = 0;
                    self.play(&r, now).await.unwrap_or(TickOutcome::Waiting)
                }
                None => {
                    self.waiting_ticks += 1;
                    if self.waiting_ticks >= *self.ledger.config().poll_max_attempts() {
                        warn!("Board vanished mid-game, closing episode without a result");
                        return self.finish_episode(GameOutcome::Unknown, now).await;
                    }
                    debug!(waiting_ticks = self.waiting_ticks, "Board not visible");
                    TickOutcome::Waiting
                }
            },
            Phase::Ended | Phase::Deciding => {
                debug!("Decision still settling");
                TickOutcome::Waiting
            }
        }
    }

    /// Stops immediately, wherever the machine is.
    ///
    /// Drops the open episode and the current opponent, disables auto-play,
    /// persists and notifies.
    #[instrument(skip(self))]
    pub async fn emergency_stop(&mut self) {
        self.stop.clear();
        self.waiting_ticks = 0;
        self.ledger.clear_opponent();
        self.classifier.reset_profile_check();
        self.halt(StopReason::Manual, Notification::EmergencyStop).await;
    }

    async fn begin_matchmaking(&mut self) -> TickOutcome {
        if *self.ledger.config().leaderboard_check_enabled() {
            let score = self.collaborators.leaderboard().current_score().await;
            if let Some(score) = leaderboard_target_hit(&self.ledger, score) {
                let target = *self.ledger.config().leaderboard_stop_score();
                self.halt(
                    StopReason::LeaderboardTarget,
                    Notification::LeaderboardTargetReached { score, target },
                )
                .await;
                return TickOutcome::Stopped(StopReason::LeaderboardTarget);
            }
        }

        if let Err(e) = self.collaborators.actuator().start_matchmaking().await {
            warn!(error = %e, "Could not start matchmaking, watchdog will retry");
            self.tick_failed = true;
        }
        info!("Matchmaking");
        self.phase = Phase::Matchmaking;
        self.waiting_ticks = 0;
        self.awaiting_rematch = false;
        TickOutcome::Matchmaking
    }

    async fn matchmaking_watchdog(&mut self) -> TickOutcome {
        self.waiting_ticks += 1;
        if self.waiting_ticks < *self.ledger.config().poll_max_attempts() {
            return TickOutcome::Waiting;
        }

        if self.awaiting_rematch {
            warn!("Rematch never started, finding a new opponent");
            self.rotate().await;
            if let Continuation::Stop(reason) = self.continuation_after_rotation() {
                return TickOutcome::Stopped(reason);
            }
        } else {
            warn!("No game found, requesting matchmaking again");
            self.waiting_ticks = 0;
            if let Err(e) = self.collaborators.actuator().start_matchmaking().await {
                warn!(error = %e, "Could not restart matchmaking");
                self.tick_failed = true;
            }
        }
        TickOutcome::Matchmaking
    }

    /// Classifies the opponent and opens an episode.
    ///
    /// Returns false when a stop arrived while the classifier was waiting,
    /// in which case the machine has already stopped.
    #[instrument(skip(self, reading), fields(opponent = ?reading.opponent_name()))]
    async fn start_episode(&mut self, reading: &SensorReading, now: DateTime<Utc>) -> bool {
        let name = reading
            .opponent_name()
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_OPPONENT)
            .to_string();

        let same_opponent = self
            .ledger
            .current_opponent()
            .as_ref()
            .is_some_and(|current| same_name(current.display_name(), &name));
        if !same_opponent {
            if self.ledger.current_opponent().is_some() {
                info!("Opponent changed without rotation");
            }
            self.ledger.clear_opponent();
            self.classifier.reset_profile_check();
        }

        let oracle = self.collaborators.oracle().clone();
        let sink = self.collaborators.sink().clone();
        let signals = self.ledger.signals();
        let classification = self
            .classifier
            .classify(&name, &signals, &mut self.ledger, oracle.as_ref(), sink.as_ref(), now)
            .await;
        if self.stop.is_requested() {
            info!("Stop requested during classification");
            self.emergency_stop().await;
            return false;
        }

        let identity = OpponentIdentity::from_display(name).with_profile(
            classification.profile_name().clone().or_else(|| {
                self.ledger
                    .current_opponent()
                    .as_ref()
                    .and_then(|o| o.profile_name().clone())
            }),
        );
        self.ledger.set_current_opponent(Some(identity.clone()));
        self.ledger.set_current_verdict(Some(*classification.verdict()));

        info!(
            opponent = %identity,
            symbol = ?reading.my_symbol(),
            verdict = %classification.verdict(),
            game = *self.ledger.games_with_current_opponent() + 1,
            "Episode started"
        );
        self.episode = Some(Episode::start(identity, *reading.my_symbol(), now));
        self.timer.reset();
        self.last_acted = None;
        self.waiting_ticks = 0;
        self.awaiting_rematch = false;
        self.phase = Phase::InProgress;
        self.persist().await;
        true
    }

    /// Places a mark when it is the operator's turn on a board not yet acted on.
    async fn play(&mut self, reading: &SensorReading, now: DateTime<Utc>) -> Option<TickOutcome> {
        if !*reading.my_turn() {
            return None;
        }

        let board = *reading.board();
        if self.last_acted == Some(board) {
            return None;
        }

        if let Some(ms) = self.timer.stop(now) {
            self.ledger.record_response_time(ms);
        }

        let config = self.ledger.config();
        let planner = MovePlanner::new(*config.opening_strategy(), config.search_limit());
        let (pos, source) = planner.plan(&board)?;

        match self.collaborators.actuator().place_mark(pos).await {
            Ok(()) => {
                self.last_acted = Some(board);
                self.timer.start(now);
                Some(TickOutcome::Moved(pos, source))
            }
            Err(e) => {
                warn!(error = %e, position = %pos, "Mark not placed, retrying next tick");
                self.tick_failed = true;
                None
            }
        }
    }

    #[instrument(skip(self))]
    async fn finish_episode(&mut self, outcome: GameOutcome, now: DateTime<Utc>) -> TickOutcome {
        self.phase = Phase::Ended;
        self.timer.reset();
        self.last_acted = None;
        self.waiting_ticks = 0;

        let mut episode = match self.episode.take() {
            Some(episode) => episode,
            None => {
                let opponent = self
                    .ledger
                    .current_opponent()
                    .clone()
                    .unwrap_or_else(|| OpponentIdentity::from_display(UNKNOWN_OPPONENT));
                Episode::start(opponent, None, now)
            }
        };
        episode.finish(outcome, now);
        let record = GameRecord::from_episode(&episode, *self.ledger.current_verdict(), now);
        self.ledger.record_game(record);
        self.episodes_completed += 1;
        info!(
            %outcome,
            opponent = %episode.opponent(),
            duration_ms = episode.duration_ms(now),
            total_losses = *self.ledger.total_losses(),
            "Episode ended"
        );

        self.phase = Phase::Deciding;
        let score = if *self.ledger.config().leaderboard_check_enabled() {
            self.collaborators.leaderboard().current_score().await
        } else {
            None
        };
        let decision = decide_continuation(&self.ledger, score);

        let continuation = match decision {
            Continuation::Stop(reason) => {
                let notification = match reason {
                    StopReason::LossLimit => Notification::LossLimitReached {
                        losses: *self.ledger.total_losses(),
                        limit: *self.ledger.config().max_losses(),
                    },
                    StopReason::LeaderboardTarget => Notification::LeaderboardTargetReached {
                        score: score.unwrap_or_default(),
                        target: *self.ledger.config().leaderboard_stop_score(),
                    },
                    StopReason::SessionDuration => Notification::SessionDurationReached {
                        elapsed_secs: self.ledger.session_elapsed(now).as_secs(),
                    },
                    StopReason::SafeMode => Notification::SafeModeEnabled {
                        errors: self.consecutive_errors,
                    },
                    StopReason::Manual => Notification::EmergencyStop,
                };
                self.halt(reason, notification).await;
                decision
            }
            _ if self.stop.is_requested() => {
                self.emergency_stop().await;
                Continuation::Stop(StopReason::Manual)
            }
            Continuation::Rematch => self.rematch_or_rotate().await,
            Continuation::Rotate => {
                self.rotate().await;
                self.continuation_after_rotation()
            }
        };

        self.persist().await;
        TickOutcome::Finished {
            outcome,
            continuation,
        }
    }

    /// Clicks rematch until it sticks, rotating when it never does.
    async fn rematch_or_rotate(&mut self) -> Continuation {
        let policy = self.ledger.config().poll_policy();
        let stop = self.stop.clone();
        let actuator = self.collaborators.actuator().clone();
        let this = &mut *self;
        let outcome = poll_or_fallback(
            policy,
            || stop.is_requested(),
            || {
                let actuator = actuator.clone();
                async move {
                    match actuator.request_rematch().await {
                        Ok(()) => true,
                        Err(e) => {
                            debug!(error = %e, "Rematch not available yet");
                            false
                        }
                    }
                }
            },
            move || async move {
                warn!("Rematch failed, finding a new opponent");
                this.rotate().await;
            },
        )
        .await;

        match outcome {
            PollOutcome::Satisfied(_) => {
                info!("Rematch requested");
                self.phase = Phase::Matchmaking;
                self.waiting_ticks = 0;
                self.awaiting_rematch = true;
                Continuation::Rematch
            }
            PollOutcome::Exhausted => self.continuation_after_rotation(),
            PollOutcome::Cancelled => {
                info!("Stop requested while waiting for a rematch");
                self.emergency_stop().await;
                Continuation::Stop(StopReason::Manual)
            }
        }
    }

    /// Rotation re-checks the leaderboard, which may have stopped play.
    fn continuation_after_rotation(&self) -> Continuation {
        match self.ledger.stop_reason() {
            Some(reason) if !*self.ledger.auto_play_enabled() => Continuation::Stop(*reason),
            _ => Continuation::Rotate,
        }
    }

    #[instrument(skip(self))]
    async fn rotate(&mut self) {
        if let Err(e) = self.collaborators.actuator().leave_room().await {
            warn!(error = %e, "Could not leave room");
            self.tick_failed = true;
        }
        self.ledger.clear_opponent();
        self.classifier.reset_profile_check();
        info!("Rotating to a new opponent");
        if let TickOutcome::Stopped(reason) = self.begin_matchmaking().await {
            debug!(%reason, "Stopped before matchmaking");
        }
    }

    async fn halt(&mut self, reason: StopReason, notification: Notification) {
        self.ledger.stop(reason);
        self.phase = Phase::Idle;
        self.episode = None;
        self.timer.reset();
        self.last_acted = None;
        self.awaiting_rematch = false;
        self.collaborators.sink().notify(&notification);
        self.persist().await;
    }

    async fn persist(&self) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.ledger).await
        {
            warn!(error = %e, "Ledger save failed, continuing in memory");
        }
    }
}

/// A board that can start an episode: visible, open, no banner.
fn is_live(reading: &SensorReading) -> bool {
    reading.round_over_text().is_none() && !reading.board().is_terminal()
}

/// Result of a finished game, preferring the board over the banner.
fn ended_outcome(reading: &SensorReading) -> Option<GameOutcome> {
    outcome_from_board(reading.board())
        .or_else(|| reading.round_over_text().as_deref().map(outcome_from_round_text))
}
