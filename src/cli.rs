//! Command-line interface for strictly_autopilot.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strictly_autopilot::ScriptedOpponent;

/// Strictly Autopilot - tic-tac-toe autoplay core
#[derive(Parser, Debug)]
#[command(name = "strictly_autopilot")]
#[command(
    about = "Perfect-play tic-tac-toe with opponent classification and session pacing",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the move the engine would play
    BestMove {
        /// Board rows separated by '/', using M (mine), T (theirs) and _ (empty)
        #[arg(short, long)]
        board: String,

        /// Search depth limit in plies (unbounded when omitted)
        #[arg(short, long)]
        depth: Option<u32>,

        /// Consult the scripted opening first
        #[arg(long)]
        opening: bool,
    },

    /// Run the autopilot against the simulated table
    Simulate {
        /// TOML configuration overriding the saved one
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Ledger file (created if it doesn't exist)
        #[arg(long, default_value = "autopilot_ledger.json")]
        ledger: PathBuf,

        /// Stop after this many episodes
        #[arg(short, long, default_value = "10")]
        episodes: u64,

        /// Opponent as NAME[:PROFILE][:STYLE]; style is first-empty, perfect or shallow
        #[arg(short, long = "opponent")]
        opponents: Vec<ScriptedOpponent>,

        /// Tick interval override in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Starting leaderboard score for the simulated site
        #[arg(long)]
        leaderboard_score: Option<u32>,

        /// Delay the simulated site takes to show a profile name
        #[arg(long, default_value = "0")]
        profile_settle_ms: u64,
    },

    /// Inspect or edit a saved ledger
    Ledger {
        /// Ledger file
        #[arg(long, default_value = "autopilot_ledger.json")]
        ledger: PathBuf,

        /// Action to apply
        #[command(subcommand)]
        action: LedgerAction,
    },
}

/// Edits applied by the `ledger` command.
#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// Print counters, statistics and the known-bot registry
    Show,
    /// Zero the loss counter
    ResetLosses,
    /// Zero the per-opponent game counts
    ResetCounts,
    /// Add a name to the known-bot registry
    AddBot {
        /// Display or profile name
        name: String,
    },
    /// Remove a name from the known-bot registry
    RemoveBot {
        /// Display or profile name
        name: String,
    },
    /// Enable auto-play
    Enable,
    /// Disable auto-play
    Disable,
}
