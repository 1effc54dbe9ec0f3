//! Tests for ledger persistence across restarts.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{Action, CountingOracle, Harness, reading};
use strictly_autopilot::{
    AutopilotConfig, Continuation, EpisodeMachine, GameOutcome, JsonFileStore, LedgerStore,
    SessionLedger, StopReason, TickOutcome,
};

fn config() -> AutopilotConfig {
    AutopilotConfig::default()
        .with_poll_interval_ms(1)
        .with_poll_max_attempts(3)
        .with_games_per_bot(2)
}

#[tokio::test]
async fn test_load_without_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("ledger.json"));
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_creates_parent_dirs_and_leaves_no_staging_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("nested").join("ledger.json");
    let store = JsonFileStore::new(&path);

    let mut ledger = SessionLedger::new(config(), Utc::now());
    ledger.set_total_losses(3);
    ledger.registry_mut().add("Sorin");
    ledger.stop(StopReason::LossLimit);
    store.save(&ledger).await.unwrap();

    assert!(path.exists());
    let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries.len(), 1);

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded, ledger);
    assert!(loaded.registry().contains("sorin"));
    assert_eq!(*loaded.stop_reason(), Some(StopReason::LossLimit));
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(JsonFileStore::new(&path).load().await.is_err());
}

#[tokio::test]
async fn test_load_enforces_configured_history_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let ledger = SessionLedger::new(config(), Utc::now());

    // A hand-edited file: smaller configured capacity, overfull ring.
    let mut json = serde_json::to_value(&ledger).unwrap();
    json["config"]["move_time_capacity"] = serde_json::json!(2);
    json["move_times"] = serde_json::json!({ "capacity": 10, "items": [100, 200, 300] });
    std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    let loaded = JsonFileStore::new(&path).load().await.unwrap().unwrap();
    assert_eq!(loaded.move_times().capacity(), 2);
    assert_eq!(loaded.signals().move_times_ms(), &vec![200, 300]);
    assert_eq!(*loaded.signals().response_time_ms(), Some(300));
}

async fn play_win(harness: &Harness, machine: &mut EpisodeMachine, opponent: &str) -> TickOutcome {
    let now = Utc::now();
    if machine.phase() == strictly_autopilot::Phase::Idle {
        harness.sensor.show(None);
        machine.tick(now).await;
    }
    harness.sensor.show(Some(reading("___/___/___", false, opponent)));
    assert_eq!(machine.tick(now).await, TickOutcome::Started);
    harness.sensor.show(Some(reading("MMM/TT_/___", false, opponent)));
    machine.tick(now).await
}

#[tokio::test]
async fn test_restart_resumes_opponent_counters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");

    // First process: one game against a known bot, then a rematch is pending.
    let harness = Harness::new(CountingOracle::default());
    let store: Arc<dyn LedgerStore> = Arc::new(JsonFileStore::new(&path));
    let mut machine = EpisodeMachine::new(
        SessionLedger::new(config(), Utc::now()),
        harness.collaborators(),
        Some(store.clone()),
    );
    machine.enable(Utc::now()).await;
    assert_eq!(
        play_win(&harness, &mut machine, "Paper Man").await,
        TickOutcome::Finished {
            outcome: GameOutcome::Win,
            continuation: Continuation::Rematch,
        }
    );
    let before = machine.ledger().clone();
    drop(machine);

    // Second process: same file, same opponent still seated.
    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(*loaded.games_with_current_opponent(), 1);
    assert_eq!(loaded.opponent_game_counts(), before.opponent_game_counts());
    assert_eq!(loaded.current_opponent(), before.current_opponent());
    assert_eq!(loaded.game_history(), before.game_history());
    assert_eq!(loaded.detection_history().len(), before.detection_history().len());
    assert!(*loaded.auto_play_enabled());

    let harness = Harness::new(CountingOracle::default());
    let mut machine = EpisodeMachine::new(loaded, harness.collaborators(), Some(store.clone()));
    assert_eq!(
        play_win(&harness, &mut machine, "Paper Man").await,
        TickOutcome::Finished {
            outcome: GameOutcome::Win,
            continuation: Continuation::Rotate,
        }
    );
    assert_eq!(harness.actuator.count(&Action::LeaveRoom), 1);

    let saved = store.load().await.unwrap().unwrap();
    assert_eq!(saved.games_against("Paper Man"), 2);
    assert_eq!(*saved.games_with_current_opponent(), 0);
    assert_eq!(saved.win_rate(), 100);
}
