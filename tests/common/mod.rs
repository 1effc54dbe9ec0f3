//! Test doubles for the page collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strictly_autopilot::{
    ActuationError, Actuator, Board, BoardSensor, Collaborators, EpisodeMachine, LeaderboardProbe,
    LedgerStore, Notification, NotificationSink, Position, ProfileOracle, SensorError,
    SensorReading, SessionLedger, StopHandle, StoreError, Symbol,
};

/// Builds a reading from a board string such as `"M__/_T_/___"`.
pub fn reading(board: &str, my_turn: bool, opponent: &str) -> SensorReading {
    let board: Board = board.parse().expect("Bad board literal");
    SensorReading::new(board, Some(Symbol::X), my_turn, Some(opponent.to_string()), None)
}

/// Same as [`reading`] with an end-of-round banner.
pub fn banner(board: &str, opponent: &str, text: &str) -> SensorReading {
    let board: Board = board.parse().expect("Bad board literal");
    SensorReading::new(
        board,
        Some(Symbol::X),
        false,
        Some(opponent.to_string()),
        Some(text.to_string()),
    )
}

/// Sensor whose next reading is set by the test.
#[derive(Default)]
pub struct ScriptedSensor {
    current: Mutex<Option<SensorReading>>,
    fail: AtomicBool,
}

impl ScriptedSensor {
    pub fn show(&self, reading: Option<SensorReading>) {
        *self.current.lock().unwrap() = reading;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl BoardSensor for ScriptedSensor {
    async fn read(&self) -> Result<Option<SensorReading>, SensorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SensorError::new("Board element not found"));
        }
        Ok(self.current.lock().unwrap().clone())
    }
}

/// Everything the machine asked the page to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Place(Position),
    StartMatchmaking,
    Rematch,
    LeaveRoom,
}

/// Actuator that records every call.
#[derive(Default)]
pub struct RecordingActuator {
    actions: Mutex<Vec<Action>>,
    fail_rematch: AtomicBool,
    stop_on_rematch: Mutex<Option<StopHandle>>,
}

impl RecordingActuator {
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn count(&self, action: &Action) -> usize {
        self.actions.lock().unwrap().iter().filter(|a| *a == action).count()
    }

    pub fn placements(&self) -> usize {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| matches!(a, Action::Place(_)))
            .count()
    }

    pub fn fail_rematches(&self, fail: bool) {
        self.fail_rematch.store(fail, Ordering::SeqCst);
    }

    /// The next rematch click requests a stop and finds no button.
    pub fn stop_on_rematch(&self, stop: StopHandle) {
        *self.stop_on_rematch.lock().unwrap() = Some(stop);
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait::async_trait]
impl Actuator for RecordingActuator {
    async fn place_mark(&self, pos: Position) -> Result<(), ActuationError> {
        self.record(Action::Place(pos));
        Ok(())
    }

    async fn start_matchmaking(&self) -> Result<(), ActuationError> {
        self.record(Action::StartMatchmaking);
        Ok(())
    }

    async fn request_rematch(&self) -> Result<(), ActuationError> {
        if let Some(stop) = self.stop_on_rematch.lock().unwrap().take() {
            stop.request();
            return Err(ActuationError::new("Play again button not found"));
        }
        if self.fail_rematch.load(Ordering::SeqCst) {
            return Err(ActuationError::new("Play again button not found"));
        }
        self.record(Action::Rematch);
        Ok(())
    }

    async fn leave_room(&self) -> Result<(), ActuationError> {
        self.record(Action::LeaveRoom);
        Ok(())
    }
}

/// Oracle answering from a fixed map, counting lookups.
#[derive(Default)]
pub struct CountingOracle {
    profiles: Mutex<HashMap<String, String>>,
    lookups: AtomicU32,
    closes: AtomicU32,
    delay: Mutex<Duration>,
    stop_on_lookup: Mutex<Option<StopHandle>>,
}

impl CountingOracle {
    pub fn with_profile(self, display_name: &str, profile_name: &str) -> Self {
        self.profiles
            .lock()
            .unwrap()
            .insert(display_name.to_string(), profile_name.to_string());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    /// The next lookup requests a stop before answering.
    pub fn stop_on_lookup(&self, stop: StopHandle) {
        *self.stop_on_lookup.lock().unwrap() = Some(stop);
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProfileOracle for CountingOracle {
    async fn resolve_authoritative_name(&self, display_name: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(stop) = self.stop_on_lookup.lock().unwrap().take() {
            stop.request();
        }
        let delay = *self.delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.profiles.lock().unwrap().get(display_name).cloned()
    }

    async fn close_panel(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Leaderboard with a score set by the test.
#[derive(Default)]
pub struct FixedLeaderboard {
    score: Mutex<Option<u32>>,
    upcoming: Mutex<VecDeque<Option<u32>>>,
}

impl FixedLeaderboard {
    pub fn set(&self, score: Option<u32>) {
        *self.score.lock().unwrap() = score;
    }

    /// Scores returned by the next reads, before falling back to the set one.
    pub fn queue(&self, scores: impl IntoIterator<Item = Option<u32>>) {
        self.upcoming.lock().unwrap().extend(scores);
    }
}

#[async_trait::async_trait]
impl LeaderboardProbe for FixedLeaderboard {
    async fn current_score(&self) -> Option<u32> {
        if let Some(score) = self.upcoming.lock().unwrap().pop_front() {
            return score;
        }
        *self.score.lock().unwrap()
    }
}

/// Sink that keeps every notification.
#[derive(Default)]
pub struct CollectingSink {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    pub fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notification: &Notification) {
        self.seen.lock().unwrap().push(notification.clone());
    }
}

/// In-memory ledger store.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Option<SessionLedger>>,
    saves: AtomicU32,
    load_delay: Mutex<Duration>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn holding(ledger: SessionLedger) -> Self {
        let store = Self::default();
        *store.saved.lock().unwrap() = Some(ledger);
        store
    }

    pub fn with_load_delay(self, delay: Duration) -> Self {
        *self.load_delay.lock().unwrap() = delay;
        self
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Option<SessionLedger> {
        self.saved.lock().unwrap().clone()
    }

    pub fn saves(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryStore {
    async fn load(&self) -> Result<Option<SessionLedger>, StoreError> {
        let delay = *self.load_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, ledger: &SessionLedger) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::new("Disk full"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock().unwrap() = Some(ledger.clone());
        Ok(())
    }
}

/// A machine wired to fresh doubles.
pub struct Harness {
    pub sensor: Arc<ScriptedSensor>,
    pub actuator: Arc<RecordingActuator>,
    pub oracle: Arc<CountingOracle>,
    pub leaderboard: Arc<FixedLeaderboard>,
    pub sink: Arc<CollectingSink>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(oracle: CountingOracle) -> Self {
        Self {
            sensor: Arc::new(ScriptedSensor::default()),
            actuator: Arc::new(RecordingActuator::default()),
            oracle: Arc::new(oracle),
            leaderboard: Arc::new(FixedLeaderboard::default()),
            sink: Arc::new(CollectingSink::default()),
            store: Arc::new(MemoryStore::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.sensor.clone(),
            self.actuator.clone(),
            self.oracle.clone(),
            self.leaderboard.clone(),
            self.sink.clone(),
        )
    }

    pub fn machine(&self, ledger: SessionLedger) -> EpisodeMachine {
        EpisodeMachine::new(ledger, self.collaborators(), Some(self.store.clone()))
    }
}
