//! Opponent classification: registry, profile check, then heuristics.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::Display;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::heuristics::{Signals, score_heuristics};
use super::registry::same_name;
use crate::collaborators::ProfileOracle;
use crate::ledger::SessionLedger;
use crate::notify::{Notification, NotificationSink};

/// Bot or human.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
    /// Automated player.
    Bot,
    /// Human player.
    Human,
}

/// Who sits across the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, new, Serialize, Deserialize)]
pub struct OpponentIdentity {
    /// Name shown at the table.
    display_name: String,
    /// Account name from the profile panel, once resolved.
    profile_name: Option<String>,
}

impl OpponentIdentity {
    /// Identity with only a display name.
    pub fn from_display(display_name: impl Into<String>) -> Self {
        Self::new(display_name.into(), None)
    }

    /// Returns a copy carrying the resolved profile name.
    pub fn with_profile(mut self, profile_name: Option<String>) -> Self {
        self.profile_name = profile_name;
        self
    }
}

impl std::fmt::Display for OpponentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.profile_name {
            Some(profile) if !same_name(profile, &self.display_name) => {
                write!(f, "{} ({})", self.display_name, profile)
            }
            _ => f.write_str(&self.display_name),
        }
    }
}

/// One factor that contributed to a verdict, in the order it was considered.
#[derive(Debug, Clone, PartialEq, Display, Serialize, Deserialize)]
pub enum Evidence {
    /// Display name is in the known-bot registry.
    #[display("known bot {}", name)]
    KnownBot {
        /// Registered name that matched.
        name: String,
    },
    /// Profile name differs from the display name.
    #[display("profile name {} differs from display name {}", profile_name, display_name)]
    ProfileMismatch {
        /// Name shown at the table.
        display_name: String,
        /// Name on the account profile.
        profile_name: String,
    },
    /// Profile name equals the display name.
    #[display("profile name {} matches", profile_name)]
    ProfileMatch {
        /// Name on the account profile.
        profile_name: String,
    },
    /// Profile panel could not be read.
    #[display("profile unavailable")]
    ProfileUnavailable,
    /// Reply faster than the fast threshold.
    #[display("fast response {}ms", ms)]
    FastResponse {
        /// Reply time.
        ms: u64,
    },
    /// Reply slower than the slow threshold.
    #[display("slow response {}ms", ms)]
    SlowResponse {
        /// Reply time.
        ms: u64,
    },
    /// Display name looks machine-generated.
    #[display("bot-like name")]
    BotLikeName,
    /// Reply times barely vary.
    #[display("consistent timing (variance {:.0})", variance)]
    ConsistentTiming {
        /// Population variance in ms².
        variance: f64,
    },
}

/// Which signal decided the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DetectionMethod {
    /// Known-bot registry.
    Registry,
    /// Profile-name comparison.
    Profile,
    /// Heuristic scoring.
    Heuristic,
}

/// Result of classifying an opponent.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct Classification {
    verdict: Verdict,
    confidence: f64,
    evidence: Vec<Evidence>,
    method: DetectionMethod,
    /// Profile name, when the profile check resolved one.
    profile_name: Option<String>,
}

impl Classification {
    /// True for registry and profile verdicts.
    pub fn is_confirmed(&self) -> bool {
        self.method != DetectionMethod::Heuristic
    }
}

/// Ledger entry for one classification.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct DetectionRecord {
    opponent: String,
    verdict: Verdict,
    confidence: f64,
    evidence: Vec<Evidence>,
    method: DetectionMethod,
    timestamp: DateTime<Utc>,
}

impl DetectionRecord {
    /// Records `classification` of `opponent` at `timestamp`.
    pub fn new(opponent: &str, classification: &Classification, timestamp: DateTime<Utc>) -> Self {
        Self {
            opponent: opponent.to_string(),
            verdict: classification.verdict,
            confidence: classification.confidence.clamp(0.0, 1.0),
            evidence: classification.evidence.clone(),
            method: classification.method,
            timestamp,
        }
    }
}

/// Last profile lookup, keyed by display name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProfileCheck {
    display_name: String,
    profile_name: Option<String>,
}

/// Classifies opponents, remembering the last profile lookup so the
/// oracle is asked at most once per opponent.
#[derive(Debug, Default)]
pub struct OpponentClassifier {
    last_checked: Option<ProfileCheck>,
}

impl OpponentClassifier {
    /// Creates a classifier with no lookup history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the last profile lookup (new opponent or emergency stop).
    #[instrument(skip(self))]
    pub fn reset_profile_check(&mut self) {
        self.last_checked = None;
    }

    /// Display name of the last profile lookup, if any.
    pub fn last_checked_name(&self) -> Option<&str> {
        self.last_checked.as_ref().map(|c| c.display_name.as_str())
    }

    /// Classifies `display_name`, recording the result in the ledger.
    ///
    /// Confirmed bots are added to the registry under both names. Never
    /// fails: an unreadable profile falls through to heuristics.
    #[instrument(skip(self, signals, ledger, oracle, sink))]
    pub async fn classify(
        &mut self,
        display_name: &str,
        signals: &Signals,
        ledger: &mut SessionLedger,
        oracle: &dyn ProfileOracle,
        sink: &dyn NotificationSink,
        now: DateTime<Utc>,
    ) -> Classification {
        let classification = self
            .evaluate(display_name, signals, ledger, oracle, sink)
            .await;

        info!(
            opponent = display_name,
            verdict = %classification.verdict,
            confidence = classification.confidence,
            method = %classification.method,
            evidence = ?classification.evidence.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            "Opponent classified"
        );
        ledger.record_detection(DetectionRecord::new(display_name, &classification, now));
        classification
    }

    async fn evaluate(
        &mut self,
        display_name: &str,
        signals: &Signals,
        ledger: &mut SessionLedger,
        oracle: &dyn ProfileOracle,
        sink: &dyn NotificationSink,
    ) -> Classification {
        if ledger.registry().contains(display_name) {
            return Classification {
                verdict: Verdict::Bot,
                confidence: 1.0,
                evidence: vec![Evidence::KnownBot {
                    name: display_name.to_string(),
                }],
                method: DetectionMethod::Registry,
                profile_name: None,
            };
        }

        let timeout = ledger.config().profile_timeout();
        let notify = *ledger.config().notify_detections();
        let (profile, fresh) = self.resolve_profile(display_name, oracle, timeout).await;

        match profile {
            Some(profile_name) if !same_name(&profile_name, display_name) => {
                let registry = ledger.registry_mut();
                registry.add(display_name);
                registry.add(&profile_name);
                if fresh && notify {
                    sink.notify(&Notification::BotDetected {
                        display_name: display_name.to_string(),
                        profile_name: profile_name.clone(),
                    });
                }
                Classification {
                    verdict: Verdict::Bot,
                    confidence: 1.0,
                    evidence: vec![Evidence::ProfileMismatch {
                        display_name: display_name.to_string(),
                        profile_name: profile_name.clone(),
                    }],
                    method: DetectionMethod::Profile,
                    profile_name: Some(profile_name),
                }
            }
            Some(profile_name) => {
                if fresh && notify {
                    sink.notify(&Notification::HumanDetected {
                        display_name: display_name.to_string(),
                        profile_name: profile_name.clone(),
                    });
                }
                Classification {
                    verdict: Verdict::Human,
                    confidence: 1.0,
                    evidence: vec![Evidence::ProfileMatch {
                        profile_name: profile_name.clone(),
                    }],
                    method: DetectionMethod::Profile,
                    profile_name: Some(profile_name),
                }
            }
            None => {
                let config = ledger.config();
                let (score, mut evidence) =
                    score_heuristics(display_name, signals, &config.thresholds());
                evidence.insert(0, Evidence::ProfileUnavailable);
                let threshold = config.sensitivity().threshold();
                let verdict = if score >= threshold {
                    Verdict::Bot
                } else {
                    Verdict::Human
                };
                debug!(score, threshold, "Heuristic verdict");
                Classification {
                    verdict,
                    confidence: score.clamp(0.0, 1.0),
                    evidence,
                    method: DetectionMethod::Heuristic,
                    profile_name: None,
                }
            }
        }
    }

    /// Looks up the profile name, reusing the last lookup for the same
    /// display name. Returns the name and whether the oracle was asked.
    async fn resolve_profile(
        &mut self,
        display_name: &str,
        oracle: &dyn ProfileOracle,
        timeout: std::time::Duration,
    ) -> (Option<String>, bool) {
        if let Some(check) = &self.last_checked
            && same_name(&check.display_name, display_name)
        {
            debug!(opponent = display_name, "Reusing profile lookup");
            return (check.profile_name.clone(), false);
        }

        // Claim the key before awaiting so a second request for this name
        // sees the lookup as taken.
        self.last_checked = Some(ProfileCheck {
            display_name: display_name.to_string(),
            profile_name: None,
        });

        let lookup = oracle.resolve_authoritative_name(display_name);
        let result = tokio::time::timeout(timeout, lookup).await;
        oracle.close_panel().await;

        let profile_name = match result {
            Ok(Some(name)) if !name.trim().is_empty() => Some(name.trim().to_string()),
            Ok(_) => {
                warn!(opponent = display_name, "Profile name unavailable");
                None
            }
            Err(_) => {
                warn!(
                    opponent = display_name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Profile lookup timed out"
                );
                None
            }
        };

        self.last_checked = Some(ProfileCheck {
            display_name: display_name.to_string(),
            profile_name: profile_name.clone(),
        });
        (profile_name, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutopilotConfig;
    use crate::notify::ChannelSink;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FixedOracle {
        answer: Option<String>,
        delay: Duration,
        lookups: AtomicU32,
        closes: AtomicU32,
    }

    impl FixedOracle {
        fn answering(answer: Option<&str>) -> Self {
            Self {
                answer: answer.map(str::to_string),
                delay: Duration::ZERO,
                lookups: AtomicU32::new(0),
                closes: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ProfileOracle for FixedOracle {
        async fn resolve_authoritative_name(&self, _display_name: &str) -> Option<String> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.answer.clone()
        }

        async fn close_panel(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ledger() -> SessionLedger {
        SessionLedger::new(AutopilotConfig::default(), Utc::now())
    }

    #[tokio::test]
    async fn test_registry_short_circuits_oracle() {
        let mut ledger = ledger();
        let oracle = FixedOracle::answering(Some("Someone"));
        let (sink, _rx) = ChannelSink::channel();
        let mut classifier = OpponentClassifier::new();

        let result = classifier
            .classify("paper man", &Signals::default(), &mut ledger, &oracle, &sink, Utc::now())
            .await;

        assert_eq!(*result.verdict(), Verdict::Bot);
        assert_eq!(*result.confidence(), 1.0);
        assert_eq!(*result.method(), DetectionMethod::Registry);
        assert_eq!(oracle.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.detection_history().len(), 1);
    }

    #[tokio::test]
    async fn test_mismatch_registers_both_names_and_notifies() {
        let mut ledger = ledger();
        let oracle = FixedOracle::answering(Some("Zorblax"));
        let (sink, mut rx) = ChannelSink::channel();
        let mut classifier = OpponentClassifier::new();

        let result = classifier
            .classify("Marcus", &Signals::default(), &mut ledger, &oracle, &sink, Utc::now())
            .await;

        assert_eq!(*result.verdict(), Verdict::Bot);
        assert_eq!(result.profile_name().as_deref(), Some("Zorblax"));
        assert!(ledger.registry().contains("marcus"));
        assert!(ledger.registry().contains("zorblax"));
        assert_eq!(oracle.closes.load(Ordering::SeqCst), 1);
        assert_eq!(
            rx.try_recv().ok(),
            Some(Notification::BotDetected {
                display_name: "Marcus".to_string(),
                profile_name: "Zorblax".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_match_is_confirmed_human() {
        let mut ledger = ledger();
        let oracle = FixedOracle::answering(Some("MARCUS"));
        let (sink, _rx) = ChannelSink::channel();
        let mut classifier = OpponentClassifier::new();

        let result = classifier
            .classify("Marcus", &Signals::default(), &mut ledger, &oracle, &sink, Utc::now())
            .await;

        assert_eq!(*result.verdict(), Verdict::Human);
        assert!(result.is_confirmed());
        assert!(!ledger.registry().contains("Marcus"));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_heuristics_and_closes_panel() {
        let config = AutopilotConfig::default().with_profile_timeout_ms(5);
        let mut ledger = SessionLedger::new(config, Utc::now());
        let oracle = FixedOracle {
            delay: Duration::from_millis(200),
            ..FixedOracle::answering(Some("Whoever"))
        };
        let (sink, _rx) = ChannelSink::channel();
        let mut classifier = OpponentClassifier::new();
        let signals = Signals::new(Some(500), vec![500, 520, 510]);

        let result = classifier
            .classify("guest42", &signals, &mut ledger, &oracle, &sink, Utc::now())
            .await;

        assert_eq!(*result.method(), DetectionMethod::Heuristic);
        assert_eq!(*result.verdict(), Verdict::Bot);
        assert_eq!(result.evidence()[0], Evidence::ProfileUnavailable);
        assert_eq!(oracle.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_classification_reuses_lookup() {
        let mut ledger = ledger();
        let oracle = FixedOracle::answering(None);
        let (sink, _rx) = ChannelSink::channel();
        let mut classifier = OpponentClassifier::new();

        for _ in 0..2 {
            classifier
                .classify("Marcus", &Signals::default(), &mut ledger, &oracle, &sink, Utc::now())
                .await;
        }
        assert_eq!(oracle.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.detection_history().len(), 2);

        classifier.reset_profile_check();
        classifier
            .classify("Marcus", &Signals::default(), &mut ledger, &oracle, &sink, Utc::now())
            .await;
        assert_eq!(oracle.lookups.load(Ordering::SeqCst), 2);
    }
}
