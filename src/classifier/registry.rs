//! Persisted registry of display and profile names known to be bots.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Names seeded into a fresh registry.
pub const DEFAULT_KNOWN_BOTS: [&str; 10] = [
    "Katha",
    "Staci",
    "Claudetta",
    "Charline",
    "Carolyne",
    "Valerye",
    "Rowena",
    "Arabel",
    "Zea",
    "Paper Man",
];

/// Case-insensitive name equality, ignoring surrounding whitespace.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Append-mostly set of bot names.
///
/// Lookups ignore case; entries keep the spelling they were added with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownBotRegistry {
    names: Vec<String>,
}

impl KnownBotRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self { names: Vec::new() }
    }

    /// Creates a registry from the given names, dropping blanks and duplicates.
    #[instrument(skip(names))]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::empty();
        for name in names {
            registry.add(name.as_ref());
        }
        registry
    }

    /// True when `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| same_name(known, name))
    }

    /// Adds `name`; returns true when it was not already present.
    #[instrument(skip(self))]
    pub fn add(&mut self, name: &str) -> bool {
        let clean = name.trim();
        if clean.is_empty() {
            warn!("Cannot add empty bot name");
            return false;
        }
        if self.contains(clean) {
            debug!(name = clean, "Bot already in known list");
            return false;
        }
        self.names.push(clean.to_string());
        info!(name = clean, total = self.names.len(), "Added bot to known list");
        true
    }

    /// Removes `name`; returns true when an entry was removed.
    #[instrument(skip(self))]
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|known| !same_name(known, name));
        let removed = self.names.len() != before;
        if removed {
            info!(name, "Removed bot from known list");
        }
        removed
    }

    /// Registered names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no names are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for KnownBotRegistry {
    fn default() -> Self {
        Self::from_names(DEFAULT_KNOWN_BOTS)
    }
}
