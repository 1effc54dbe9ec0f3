//! Ledger persistence.

use std::path::{Path, PathBuf};

use derive_more::{Display, Error};
use tracing::{debug, info, instrument};

use crate::ledger::SessionLedger;

/// Loads and saves the session ledger.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Loads the saved ledger; `None` when nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saved data exists but cannot be read.
    async fn load(&self) -> Result<Option<SessionLedger>, StoreError>;

    /// Saves the ledger, replacing any previous copy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the ledger cannot be written.
    async fn save(&self, ledger: &SessionLedger) -> Result<(), StoreError>;
}

/// Stores the ledger as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

#[async_trait::async_trait]
impl LedgerStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<SessionLedger>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved ledger");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let mut ledger: SessionLedger = serde_json::from_str(&content)?;
        ledger.apply_capacities();
        info!(
            total_losses = *ledger.total_losses(),
            known_bots = ledger.registry().len(),
            "Ledger loaded"
        );
        Ok(Some(ledger))
    }

    #[instrument(skip(self, ledger), fields(path = %self.path.display()))]
    async fn save(&self, ledger: &SessionLedger) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(ledger)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        debug!("Ledger saved");
        Ok(())
    }
}

/// Persistence error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("JSON error: {}", err))
    }
}
