//! Persisted state file with atomic replacement.
//!
//! A commit writes the complete record to `<name>.tmp` next to the target,
//! holding an exclusive advisory lock on it, truncates it to exactly the
//! written length, syncs it, and renames it over the target. The rename is
//! the only point at which readers can observe the new state.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::{AppError, PersistedState, Result};

use super::fsync::{fsync_dir, fsync_file};

/// Handle on one stream's state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store for the given state file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state. A missing file is `Ok(None)`.
    ///
    /// # Errors
    /// Returns `Io` for any other open or read failure and `CorruptState` if
    /// the content does not parse.
    pub fn load(&self) -> Result<Option<PersistedState>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No state file, starting from history start");
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::io(
                    format!("Failed to open state file {}", self.path.display()),
                    e,
                ))
            }
        };

        file.lock_shared()
            .map_err(|e| AppError::io("Failed to lock state file", e))?;

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(|e| {
            AppError::io(
                format!("Failed to read state file {}", self.path.display()),
                e,
            )
        })?;

        let state = PersistedState::parse(&content)
            .map_err(|message| AppError::corrupt_state(&self.path, message))?;

        tracing::debug!(path = %self.path.display(), position = %state.position, "Loaded state");
        Ok(Some(state))
    }

    /// When the state was last committed, if it exists.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be queried.
    pub fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        match fs::metadata(&self.path) {
            Ok(metadata) => {
                let modified = metadata
                    .modified()
                    .map_err(|e| AppError::io("Failed to get state file time", e))?;
                Ok(Some(DateTime::<Utc>::from(modified)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::io("Failed to stat state file", e)),
        }
    }

    /// Write and publish a new state.
    ///
    /// # Errors
    /// Returns error if any step fails; the previous state is then untouched.
    pub fn commit(&self, state: &PersistedState) -> Result<()> {
        self.stage(state)?.publish()
    }

    /// Write the new state to the temporary file without publishing it.
    ///
    /// # Errors
    /// Returns error if the temporary file cannot be created, locked, written
    /// or synced.
    pub fn stage(&self, state: &PersistedState) -> Result<StagedState> {
        let dir = self.dir();
        fs::create_dir_all(dir)
            .map_err(|e| AppError::io("Failed to create state directory", e))?;

        let temp_path = self.temp_path()?;
        let payload = state.to_file_string();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&temp_path)
            .map_err(|e| {
                AppError::io(
                    format!("Failed to create temporary state file {}", temp_path.display()),
                    e,
                )
            })?;

        file.lock()
            .map_err(|e| AppError::io("Failed to lock temporary state file", e))?;

        let write_err = |e| AppError::io("Failed to write temporary state file", e);
        file.write_all(payload.as_bytes()).map_err(write_err)?;
        // A stale, longer temp file may have been left by an earlier crash.
        file.set_len(payload.len() as u64).map_err(write_err)?;
        fsync_file(&file).map_err(write_err)?;

        Ok(StagedState {
            file,
            temp_path,
            target: self.path.clone(),
        })
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| AppError::Config {
            message: format!("State file path has no file name: {}", self.path.display()),
        })?;
        let mut temp_name = name.to_os_string();
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }
}

/// A fully written, locked temporary state file awaiting publication.
///
/// Dropping it without calling `publish` leaves the committed state as it was.
#[derive(Debug)]
pub struct StagedState {
    file: File,
    temp_path: PathBuf,
    target: PathBuf,
}

impl StagedState {
    /// Path of the temporary file.
    #[cfg(test)]
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically rename the temporary file over the target.
    ///
    /// # Errors
    /// Returns error if the rename or the directory sync fails.
    pub fn publish(self) -> Result<()> {
        fs::rename(&self.temp_path, &self.target).map_err(|e| {
            AppError::io(
                format!("Failed to replace state file {}", self.target.display()),
                e,
            )
        })?;

        let dir = match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fsync_dir(dir).map_err(|e| AppError::io("Failed to sync state directory", e))?;

        tracing::debug!(path = %self.target.display(), "State committed");
        drop(self.file);
        Ok(())
    }
}
