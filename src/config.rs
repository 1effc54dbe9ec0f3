//! Autopilot configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::classifier::{HeuristicThresholds, Sensitivity};
use crate::engine::SearchDepth;
use crate::poll::PollPolicy;

/// Tunables for play, classification and session pacing.
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct AutopilotConfig {
    /// How readily heuristic scores turn into a bot verdict.
    sensitivity: Sensitivity,

    /// Games to play against one bot before rotating.
    games_per_bot: u32,

    /// Games to play against one human before rotating.
    games_per_human: u32,

    /// Losses after which auto-play stops.
    max_losses: u32,

    /// Whether the session-duration guard is active.
    session_limit_enabled: bool,

    /// Session length ceiling in seconds.
    session_limit_secs: u64,

    /// Whether the leaderboard score is checked before continuing.
    leaderboard_check_enabled: bool,

    /// Score at which auto-play stops.
    leaderboard_stop_score: u32,

    /// Play the scripted center/opposite-corner opening.
    opening_strategy: bool,

    /// Search depth limit in plies; `None` plays perfectly.
    #[setters(strip_option)]
    search_depth: Option<u32>,

    /// Opponent replies faster than this count toward a bot verdict.
    fast_response_ms: u64,

    /// Opponent replies slower than this count toward a human verdict.
    slow_response_ms: u64,

    /// Response-time variance (ms²) below which timing looks scripted.
    low_variance_ms2: f64,

    /// Budget for one profile-name lookup.
    profile_timeout_ms: u64,

    /// Interval between attempts when waiting on the page.
    poll_interval_ms: u64,

    /// Attempts before a wait gives up and takes its fallback.
    poll_max_attempts: u32,

    /// Failed ticks in a row before auto-play drops into safe mode.
    max_consecutive_errors: u32,

    /// Interval between autopilot ticks.
    tick_interval_ms: u64,

    /// Detection records kept in the ledger.
    detection_history_capacity: usize,

    /// Response-time samples kept for variance analysis.
    move_time_capacity: usize,

    /// Finished games kept in the ledger.
    game_history_capacity: usize,

    /// Emit bot/human detection notifications.
    notify_detections: bool,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            sensitivity: Sensitivity::Balanced,
            games_per_bot: 7,
            games_per_human: 1,
            max_losses: 5,
            session_limit_enabled: true,
            session_limit_secs: 24 * 60 * 60,
            leaderboard_check_enabled: false,
            leaderboard_stop_score: 16_000,
            opening_strategy: false,
            search_depth: None,
            fast_response_ms: 3_000,
            slow_response_ms: 8_000,
            low_variance_ms2: 1_000_000.0,
            profile_timeout_ms: 5_000,
            poll_interval_ms: 500,
            poll_max_attempts: 20,
            max_consecutive_errors: 10,
            tick_interval_ms: 1_000,
            detection_history_capacity: 20,
            move_time_capacity: 10,
            game_history_capacity: 100,
            notify_detections: true,
        }
    }
}

impl AutopilotConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// the values fail [`AutopilotConfig::validate`].
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(
            sensitivity = %config.sensitivity,
            games_per_bot = config.games_per_bot,
            max_losses = config.max_losses,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML or invalid values.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the state machine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the offending field.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.games_per_bot == 0 || self.games_per_human == 0 {
            return Err(ConfigError::new(
                "games_per_bot and games_per_human must be at least 1".to_string(),
            ));
        }
        if self.max_losses == 0 {
            return Err(ConfigError::new("max_losses must be at least 1".to_string()));
        }
        if self.fast_response_ms > self.slow_response_ms {
            return Err(ConfigError::new(
                "fast_response_ms must not exceed slow_response_ms".to_string(),
            ));
        }
        if self.poll_max_attempts == 0 {
            return Err(ConfigError::new("poll_max_attempts must be at least 1".to_string()));
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConfigError::new("max_consecutive_errors must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Search depth as understood by the engine.
    pub fn search_limit(&self) -> SearchDepth {
        SearchDepth::from_limit(self.search_depth)
    }

    /// Heuristic thresholds for the classifier.
    pub fn thresholds(&self) -> HeuristicThresholds {
        HeuristicThresholds::new(
            self.fast_response_ms,
            self.slow_response_ms,
            self.low_variance_ms2,
        )
    }

    /// Poll policy for waits on the page.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(self.poll_interval_ms), self.poll_max_attempts)
    }

    /// Session length ceiling.
    pub fn session_limit(&self) -> Duration {
        Duration::from_secs(self.session_limit_secs)
    }

    /// Budget for one profile-name lookup.
    pub fn profile_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_timeout_ms)
    }

    /// Interval between autopilot ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Per-verdict game cap.
    pub fn games_cap(&self, is_bot: bool) -> u32 {
        if is_bot {
            self.games_per_bot
        } else {
            self.games_per_human
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AutopilotConfig::from_toml(
            r#"
sensitivity = "aggressive"
games_per_bot = 3
opening_strategy = true
"#,
        )
        .unwrap();
        assert_eq!(*config.sensitivity(), Sensitivity::Aggressive);
        assert_eq!(*config.games_per_bot(), 3);
        assert!(*config.opening_strategy());
        assert_eq!(*config.max_losses(), 5);
        assert_eq!(*config.session_limit_secs(), 86_400);
    }

    #[test]
    fn test_zero_game_cap_rejected() {
        let result = AutopilotConfig::from_toml("games_per_human = 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_error_budget_rejected() {
        assert!(AutopilotConfig::from_toml("max_consecutive_errors = 0").is_err());
        let config = AutopilotConfig::from_toml("max_consecutive_errors = 3").unwrap();
        assert_eq!(*config.max_consecutive_errors(), 3);
    }

    #[test]
    fn test_setters_chain() {
        let config = AutopilotConfig::default()
            .with_max_losses(2)
            .with_search_depth(1);
        assert_eq!(*config.max_losses(), 2);
        assert_eq!(config.search_limit(), SearchDepth::Limited(1));
    }
}
