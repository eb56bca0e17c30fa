//! Configuration models.
//!
//! Describes one logical log stream: its rotated files, where its state is
//! kept, how lost positions are handled, and which lines feed which counter.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::state::CounterKind;

/// One `{pattern, counter}` classifier entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Counter incremented when the pattern matches.
    pub counter: CounterKind,

    /// Regular expression matched anywhere in the line.
    pub pattern: String,
}

impl ClassifierConfig {
    /// Create a classifier entry.
    #[must_use]
    pub fn new(counter: CounterKind, pattern: impl Into<String>) -> Self {
        Self {
            counter,
            pattern: pattern.into(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persisted state file; defaults to `state` under the data directory.
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Rotated log files, oldest first.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// On lost position, resume from the oldest file (true) or from the end
    /// of the newest file (false).
    #[serde(default = "default_recover_lost_position")]
    pub recover_lost_position: bool,

    /// With no prior state, start at the end of the newest file.
    #[serde(default)]
    pub skip_history: bool,

    /// Ordered classifiers; a line may match any number of them.
    #[serde(default)]
    pub classifiers: Vec<ClassifierConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            files: Vec::new(),
            recover_lost_position: default_recover_lost_position(),
            skip_history: false,
            classifiers: Vec::new(),
        }
    }
}

const fn default_recover_lost_position() -> bool {
    true
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".logtally")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Get the state file path, using the default if not configured.
    #[must_use]
    pub fn state_file_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("state"))
    }
}
