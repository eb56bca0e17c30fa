//! Configuration file management.
//!
//! Handles loading TOML configuration files and creating the default one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# logtally configuration
# Auto-generated - edit as needed

# Where counters and the resume position are kept
# (default: ~/.logtally/state)
# state_file = "/var/lib/logtally/mail.state"

# Rotated log files, oldest first
files = ["/var/log/mail.log.1", "/var/log/mail.log"]

# When the file being read vanishes from the set: true resumes from the
# oldest file, false skips to the end of the newest
recover_lost_position = true

# On the very first run, ignore existing history and start at the end
skip_history = false

[[classifiers]]
counter = "messages"
pattern = 'postfix/qmgr\[\d+\]: \w+: from=<[^>]*>, size='

[[classifiers]]
counter = "recipients"
pattern = 'postfix/(smtp|lmtp|local|virtual|pipe)\[\d+\]: \w+: to=<[^>]*>.*status=sent'

[[classifiers]]
counter = "completed"
pattern = 'postfix/qmgr\[\d+\]: \w+: removed'
"#;

/// Load configuration from `path`, or from the default location.
///
/// A missing file at the default location yields the default configuration;
/// an explicitly named file must exist.
///
/// # Errors
/// Returns error if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config_from_file(path),
        None => {
            let config_path = AppConfig::default_config_path();
            if config_path.exists() {
                load_config_from_file(&config_path)
            } else {
                tracing::debug!(path = %config_path.display(), "No config file, using defaults");
                Ok(AppConfig::default())
            }
        }
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file {}: {e}", path.display()),
    })
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns the path and whether the file was created.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: Option<&Path>) -> Result<(PathBuf, bool)> {
    let config_path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if config_path.exists() {
        return Ok((config_path, false));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(&config_path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %config_path.display(), "Created default configuration");

    Ok((config_path, true))
}
