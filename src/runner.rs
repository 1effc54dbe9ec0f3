//! The cooperative tick loop around the episode machine.

use std::sync::Arc;

use chrono::Utc;
use derive_getters::Getters;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::collaborators::Collaborators;
use crate::config::AutopilotConfig;
use crate::episode::{EpisodeMachine, StopHandle, TickOutcome};
use crate::ledger::SessionLedger;
use crate::store::{LedgerStore, StoreError};

/// Ticks between health log lines.
const HEALTH_LOG_EVERY: u64 = 30;

type LoadResult = Result<Result<Option<SessionLedger>, StoreError>, tokio::task::JoinError>;

enum LoadState {
    Pending(JoinHandle<Result<Option<SessionLedger>, StoreError>>),
    Ready(Box<EpisodeMachine>),
}

/// What a finished run leaves behind.
#[derive(Debug, Clone, Getters)]
pub struct RunReport {
    /// Episodes finished during the run.
    episodes_completed: u64,
    /// Ledger as it stood when the run ended.
    ledger: SessionLedger,
}

/// Drives an [`EpisodeMachine`] on a fixed tick until it stops.
///
/// The saved ledger loads in the background; ticks that arrive before it
/// is ready are skipped.
pub struct Autopilot {
    collaborators: Collaborators,
    store: Arc<dyn LedgerStore>,
    config: Option<AutopilotConfig>,
    enable_on_start: bool,
    max_episodes: Option<u64>,
    stop: StopHandle,
}

impl Autopilot {
    /// Creates a runner that persists through `store`.
    pub fn new(collaborators: Collaborators, store: Arc<dyn LedgerStore>) -> Self {
        Self {
            collaborators,
            store,
            config: None,
            enable_on_start: false,
            max_episodes: None,
            stop: StopHandle::new(),
        }
    }

    /// Replaces the saved configuration once the ledger loads.
    pub fn with_config(mut self, config: AutopilotConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Enables auto-play once the ledger loads.
    pub fn enable_on_start(mut self, enable: bool) -> Self {
        self.enable_on_start = enable;
        self
    }

    /// Ends the run after this many episodes.
    pub fn with_max_episodes(mut self, max_episodes: Option<u64>) -> Self {
        self.max_episodes = max_episodes;
        self
    }

    /// Handle for an emergency stop from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs until auto-play stops, is disabled, or the episode budget is spent.
    #[instrument(skip(self), fields(max_episodes = ?self.max_episodes))]
    pub async fn run(self) -> RunReport {
        let store = self.store.clone();
        let mut state = LoadState::Pending(tokio::spawn(async move { store.load().await }));
        let initial = self.config.clone().unwrap_or_default();
        let mut interval = ticker(&initial);
        let mut ticks = 0u64;

        info!("Autopilot starting");
        loop {
            interval.tick().await;

            if let LoadState::Pending(handle) = &mut state {
                if !handle.is_finished() {
                    debug!("Ledger not loaded yet, deferring tick");
                    continue;
                }
                let loaded = handle.await;
                let machine = self.build_machine(loaded).await;
                interval = ticker(machine.ledger().config());
                state = LoadState::Ready(Box::new(machine));
            }
            let LoadState::Ready(machine) = &mut state else {
                continue;
            };

            let now = Utc::now();
            let outcome = machine.tick(now).await;
            ticks += 1;
            if ticks % HEALTH_LOG_EVERY == 0 {
                log_health(machine.ledger(), machine.episodes_completed(), now);
            }

            match outcome {
                TickOutcome::Stopped(reason) => {
                    info!(%reason, "Autopilot stopped");
                    break;
                }
                TickOutcome::Disabled => {
                    info!("Auto-play disabled, autopilot exiting");
                    break;
                }
                _ => {}
            }

            if self
                .max_episodes
                .is_some_and(|max| machine.episodes_completed() >= max)
            {
                info!(episodes = machine.episodes_completed(), "Episode budget spent");
                break;
            }
        }

        match state {
            LoadState::Ready(machine) => RunReport {
                episodes_completed: machine.episodes_completed(),
                ledger: machine.ledger().clone(),
            },
            LoadState::Pending(_) => RunReport {
                episodes_completed: 0,
                ledger: SessionLedger::new(initial, Utc::now()),
            },
        }
    }

    async fn build_machine(&self, loaded: LoadResult) -> EpisodeMachine {
        let now = Utc::now();
        let mut ledger = match loaded {
            Ok(Ok(Some(ledger))) => ledger,
            Ok(Ok(None)) => {
                info!("Starting a fresh ledger");
                SessionLedger::new(AutopilotConfig::default(), now)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Ledger load failed, starting fresh");
                SessionLedger::new(AutopilotConfig::default(), now)
            }
            Err(e) => {
                warn!(error = %e, "Ledger load task failed, starting fresh");
                SessionLedger::new(AutopilotConfig::default(), now)
            }
        };
        if let Some(config) = &self.config {
            ledger.set_config(config.clone());
        }

        let mut machine = EpisodeMachine::new(
            ledger,
            self.collaborators.clone(),
            Some(self.store.clone()),
        )
        .with_stop_handle(self.stop.clone());
        if self.enable_on_start {
            machine.enable(now).await;
        }
        machine
    }
}

fn ticker(config: &AutopilotConfig) -> Interval {
    let mut interval = tokio::time::interval(config.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn log_health(ledger: &SessionLedger, episodes: u64, now: chrono::DateTime<Utc>) {
    info!(
        runtime = %ledger.runtime(now),
        episodes,
        total_losses = *ledger.total_losses(),
        win_rate = ledger.win_rate(),
        detection_accuracy = ledger.detection_accuracy(),
        known_bots = ledger.registry().len(),
        "Autopilot health"
    );
}
