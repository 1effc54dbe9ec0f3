//! Strictly Autopilot - CLI
//!
//! Engine queries, simulated autopilot runs and ledger maintenance.

#![warn(missing_docs)]

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command, LedgerAction};
use strictly_autopilot::{
    AutopilotConfig, Autopilot, Board, ChannelSink, JsonFileStore, LedgerStore, MovePlanner,
    ScriptedOpponent, SearchDepth, SessionLedger, SimulatedTable, StopReason, TableSettings,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::BestMove {
            board,
            depth,
            opening,
        } => best_move(&board, depth, opening),
        Command::Simulate {
            config,
            ledger,
            episodes,
            opponents,
            tick_ms,
            leaderboard_score,
            profile_settle_ms,
        } => {
            let settings = TableSettings::new(
                Duration::from_millis(profile_settle_ms),
                leaderboard_score,
                true,
            );
            simulate(config.as_deref(), &ledger, episodes, opponents, tick_ms, settings).await
        }
        Command::Ledger { ledger, action } => edit_ledger(&ledger, action).await,
    }
}

/// Print the engine's move for a board
#[instrument]
fn best_move(board: &str, depth: Option<u32>, opening: bool) -> Result<()> {
    let board: Board = board.parse()?;
    if let Err(e) = board.validate() {
        warn!(error = %e, "Board has an unusual mark balance");
    }
    let planner = MovePlanner::new(opening, SearchDepth::from_limit(depth));
    match planner.plan(&board) {
        Some((pos, source)) => println!("{} ({}, {})", pos, pos.label(), source),
        None => println!("No move: the game is over"),
    }
    Ok(())
}

/// Run the autopilot against the simulated table
#[instrument(skip(opponents), fields(opponents = opponents.len()))]
async fn simulate(
    config_path: Option<&Path>,
    ledger_path: &Path,
    episodes: u64,
    opponents: Vec<ScriptedOpponent>,
    tick_ms: Option<u64>,
    settings: TableSettings,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Some(AutopilotConfig::from_file(path)?),
        None => None,
    };
    if let Some(ms) = tick_ms {
        config = Some(config.unwrap_or_default().with_tick_interval_ms(ms));
    }

    let opponents = if opponents.is_empty() {
        default_opponents()?
    } else {
        opponents
    };
    let table = SimulatedTable::new(opponents, settings);

    let (sink, mut notifications) = ChannelSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!("» {}", notification);
        }
    });

    let mut autopilot = Autopilot::new(
        table.collaborators(Arc::new(sink)),
        Arc::new(JsonFileStore::new(ledger_path)),
    )
    .enable_on_start(true)
    .with_max_episodes(Some(episodes));
    if let Some(config) = config {
        autopilot = autopilot.with_config(config);
    }

    let stop = autopilot.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.request();
        }
    });

    info!(episodes, "Starting simulation");
    let report = autopilot.run().await;
    printer.abort();

    let ledger = report.ledger();
    println!("Episodes:           {}", report.episodes_completed());
    print_summary(ledger);
    println!("Table:              {:?}", table.stats());
    Ok(())
}

fn default_opponents() -> Result<Vec<ScriptedOpponent>> {
    ["Marcus:perfect", "guest4821", "Nadia:Staci:shallow"]
        .into_iter()
        .map(|spec| spec.parse::<ScriptedOpponent>().map_err(anyhow::Error::msg))
        .collect()
}

/// Apply a ledger action and save
#[instrument(skip(action))]
async fn edit_ledger(path: &Path, action: LedgerAction) -> Result<()> {
    let store = JsonFileStore::new(path);
    let now = Utc::now();
    let mut ledger = match store.load().await? {
        Some(ledger) => ledger,
        None => {
            info!("No ledger yet, starting fresh");
            SessionLedger::new(AutopilotConfig::default(), now)
        }
    };

    match action {
        LedgerAction::Show => {
            print_summary(&ledger);
            println!("Known bots:         {}", ledger.registry().names().join(", "));
            for (name, games) in ledger.opponent_game_counts() {
                println!("  {:<20} {} games", name, games);
            }
            return Ok(());
        }
        LedgerAction::ResetLosses => ledger.reset_losses(),
        LedgerAction::ResetCounts => ledger.reset_opponent_counts(),
        LedgerAction::AddBot { name } => {
            if !ledger.registry_mut().add(&name) {
                println!("{} is already known (or blank)", name);
            }
        }
        LedgerAction::RemoveBot { name } => {
            if !ledger.registry_mut().remove(&name) {
                println!("{} was not in the registry", name);
            }
        }
        LedgerAction::Enable => ledger.resume(now),
        LedgerAction::Disable => ledger.stop(StopReason::Manual),
    }

    store.save(&ledger).await?;
    println!("Ledger saved to {}", path.display());
    Ok(())
}

fn print_summary(ledger: &SessionLedger) {
    let now = Utc::now();
    let auto_play = if *ledger.auto_play_enabled() {
        "enabled"
    } else {
        "disabled"
    };
    println!("Auto-play:          {}", auto_play);
    if let Some(reason) = ledger.stop_reason() {
        println!("Stopped:            {}", reason);
    }
    println!("Runtime:            {}", ledger.runtime(now));
    println!("Losses:             {}/{}", ledger.total_losses(), ledger.config().max_losses());
    println!("Games recorded:     {}", ledger.game_history().len());
    println!("Win rate:           {}%", ledger.win_rate());
    println!("Detection accuracy: {}%", ledger.detection_accuracy());
}
