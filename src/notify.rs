//! Structured notifications for whoever presents autopilot events.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// An event worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Notification {
    /// Display name and profile name disagree.
    #[display("Bot detected: {} (profile name {})", display_name, profile_name)]
    BotDetected {
        /// Name shown at the table.
        display_name: String,
        /// Name on the account profile.
        profile_name: String,
    },
    /// Display name and profile name agree.
    #[display("Human detected: {}", display_name)]
    HumanDetected {
        /// Name shown at the table.
        display_name: String,
        /// Name on the account profile.
        profile_name: String,
    },
    /// The loss cap stopped auto-play.
    #[display("Loss limit reached: {}/{} losses", losses, limit)]
    LossLimitReached {
        /// Losses this session.
        losses: u32,
        /// Configured cap.
        limit: u32,
    },
    /// The session-duration guard stopped auto-play.
    #[display("Session duration limit reached after {}s", elapsed_secs)]
    SessionDurationReached {
        /// Session age in seconds.
        elapsed_secs: u64,
    },
    /// The leaderboard target stopped auto-play.
    #[display("Leaderboard target reached: {} >= {}", score, target)]
    LeaderboardTargetReached {
        /// Current score.
        score: u32,
        /// Configured stop score.
        target: u32,
    },
    /// Auto-play was stopped by the user.
    #[display("Emergency stop")]
    EmergencyStop,
    /// Repeated failures disabled auto-play.
    #[display("Safe mode enabled after {} consecutive errors", errors)]
    SafeModeEnabled {
        /// Failed ticks in a row.
        errors: u32,
    },
}

/// Receives notifications. Delivery must not fail the caller.
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    #[instrument(skip(self))]
    fn notify(&self, notification: &Notification) {
        info!(%notification, "Notification");
    }
}

/// Forwards notifications over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    #[instrument(skip(self))]
    fn notify(&self, notification: &Notification) {
        if self.tx.send(notification.clone()).is_err() {
            warn!(%notification, "Notification receiver dropped");
        }
    }
}
