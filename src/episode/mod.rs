//! Episode lifecycle: phases, continuation policy and the state machine.

mod machine;
mod phase;
mod policy;

pub use machine::{EpisodeMachine, StopHandle, TickOutcome};
pub use phase::{Continuation, Episode, GameOutcome, GameRecord, Phase, StopReason};
pub use policy::{
    decide_continuation, leaderboard_target_hit, outcome_from_board, outcome_from_round_text,
};
