//! One scheduled tally run.
//!
//! Loads the last committed state, resumes the cursor from it, drains every
//! line available now, and commits the new position and counters together.
//! A run that fails anywhere commits nothing, so the next run starts again
//! from the last committed position.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{AppConfig, Counters, PersistedState, PositionToken, Result};
use crate::infrastructure::{MultiFileCursor, StateStore};

use super::accumulator::CounterAccumulator;
use super::classifier::ClassifierSet;

/// Where a run started reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeKind {
    /// No state existed; started at the beginning or end of history.
    Fresh,
    /// Resumed from the committed position.
    Saved,
    /// The committed position's file was gone; used the lost-position policy.
    Fallback,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// How the starting position was chosen.
    pub resumed: ResumeKind,
    /// State before the run.
    pub previous: PersistedState,
    /// State committed by the run.
    pub current: PersistedState,
    /// Counter increments made by this run.
    pub delta: Counters,
    /// Lines read.
    pub lines_read: u64,
    /// Lines matching at least one classifier.
    pub lines_matched: u64,
    /// When the state was committed.
    pub finished_at: DateTime<Utc>,
}

/// Service running tally passes over one log stream.
pub struct TallyService {
    files: Vec<PathBuf>,
    recover_lost_position: bool,
    skip_history: bool,
    store: StateStore,
    classifiers: ClassifierSet,
}

impl TallyService {
    /// Create a service from configuration.
    ///
    /// # Errors
    /// Returns error if a classifier pattern does not compile.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let classifiers = ClassifierSet::from_config(&config.classifiers)?;
        let store = StateStore::new(config.state_file_path());

        Ok(Self::with_parts(config, store, classifiers))
    }

    /// Create with an existing store and classifier set.
    #[must_use]
    pub fn with_parts(config: &AppConfig, store: StateStore, classifiers: ClassifierSet) -> Self {
        if config.files.is_empty() {
            tracing::warn!("No log files configured, runs will read nothing");
        }
        if classifiers.is_empty() {
            tracing::warn!("No classifiers configured, counters will not change");
        }

        Self {
            files: config.files.clone(),
            recover_lost_position: config.recover_lost_position,
            skip_history: config.skip_history,
            store,
            classifiers,
        }
    }

    /// Perform one run and commit its result.
    ///
    /// # Errors
    /// Returns error if the state cannot be loaded or committed, or a log
    /// file cannot be read. Nothing is committed in that case.
    pub fn run(&self) -> Result<RunReport> {
        tracing::info!(state = %self.store.path().display(), "Starting tally run");

        let saved = self.store.load()?;
        let previous = saved.unwrap_or_default();

        let mut cursor = MultiFileCursor::new(self.files.clone(), self.recover_lost_position);
        let resumed = self.resume(&mut cursor, saved.as_ref())?;

        let accumulation =
            CounterAccumulator::new(&self.classifiers).accumulate(&mut cursor, previous.counters)?;
        drop(cursor);

        self.store.commit(&accumulation.state)?;

        let report = RunReport {
            resumed,
            previous,
            current: accumulation.state,
            delta: accumulation.state.counters.delta_since(&previous.counters),
            lines_read: accumulation.lines_read,
            lines_matched: accumulation.lines_matched,
            finished_at: Utc::now(),
        };

        tracing::info!(
            lines = report.lines_read,
            matched = report.lines_matched,
            messages = report.current.counters.messages,
            recipients = report.current.counters.recipients,
            completed = report.current.counters.completed,
            position = %report.current.position,
            "Tally run committed"
        );

        Ok(report)
    }

    /// Position the cursor for this run.
    fn resume(
        &self,
        cursor: &mut MultiFileCursor,
        saved: Option<&PersistedState>,
    ) -> Result<ResumeKind> {
        let Some(saved) = saved else {
            let start = if self.skip_history {
                PositionToken::End
            } else {
                PositionToken::Start
            };
            let position = cursor.seek(start)?;
            tracing::info!(%position, "No saved state, starting fresh");
            return Ok(ResumeKind::Fresh);
        };

        if saved.position == PositionToken::End {
            let position = cursor.await_newest();
            tracing::debug!(%position, "Resumed waiting for the newest file");
            return Ok(ResumeKind::Saved);
        }

        match cursor.seek(saved.position) {
            Ok(position) => {
                tracing::debug!(%position, "Resumed from saved position");
                Ok(ResumeKind::Saved)
            }
            Err(e) if e.is_position_not_found() => {
                let fallback = cursor.fallback_position();
                tracing::warn!(
                    saved = %saved.position,
                    %fallback,
                    "Saved position not found in file set, falling back"
                );
                cursor.seek(fallback)?;
                Ok(ResumeKind::Fallback)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClassifierConfig, CounterKind};
    use crate::infrastructure::file_identity::identity_at_path;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            state_file: Some(dir.path().join("state/mail.state")),
            files: vec![dir.path().join("log.1"), dir.path().join("log")],
            classifiers: vec![
                ClassifierConfig::new(CounterKind::Messages, "accepted"),
                ClassifierConfig::new(CounterKind::Recipients, "routed"),
                ClassifierConfig::new(CounterKind::Completed, "completed"),
            ],
            ..Default::default()
        }
    }

    fn counting_all(config: &AppConfig) -> TallyService {
        let classifiers = ClassifierSet::default().with(CounterKind::Messages, |_: &str| true);
        TallyService::with_parts(config, StateStore::new(config.state_file_path()), classifiers)
    }

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn rotate(dir: &TempDir) {
        fs::rename(dir.path().join("log"), dir.path().join("log.1")).unwrap();
    }

    #[test]
    fn test_two_file_scenario() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("log.1"), "m1 accepted\nm2 accepted\n").unwrap();
        fs::write(dir.path().join("log"), "m3 accepted\nm1 completed\n").unwrap();
        let config = config(&dir);
        let service = TallyService::new(&config).unwrap();

        let first = service.run().unwrap();
        assert_eq!(first.resumed, ResumeKind::Fresh);
        assert_eq!(
            first.current.counters,
            Counters {
                messages: 3,
                recipients: 0,
                completed: 1
            }
        );
        let newest = identity_at_path(&dir.path().join("log")).unwrap().unwrap();
        assert_eq!(first.current.position, PositionToken::at(25, newest));

        let committed = fs::read(config.state_file_path()).unwrap();

        let second = service.run().unwrap();
        assert_eq!(second.resumed, ResumeKind::Saved);
        assert_eq!(second.current, first.current);
        assert_eq!(second.lines_read, 0);
        assert_eq!(second.delta, Counters::default());
        assert_eq!(fs::read(config.state_file_path()).unwrap(), committed);
    }

    #[test]
    fn test_resume_across_appends_and_rotations() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log");
        let config = config(&dir);
        let service = counting_all(&config);

        let mut appended = 0u64;
        let mut write = |lines: u64| {
            for i in 0..lines {
                append(&log, &format!("line {}\n", appended + i));
            }
            appended += lines;
        };

        write(3);
        assert_eq!(service.run().unwrap().delta.messages, 3);

        write(2);
        rotate(&dir);
        write(4);
        assert_eq!(service.run().unwrap().delta.messages, 6);

        rotate(&dir);
        write(1);
        // Archive the file the saved position points into, outside the set.
        fs::rename(dir.path().join("log.1"), dir.path().join("archived")).unwrap();
        rotate(&dir);
        write(2);
        let report = service.run().unwrap();
        assert_eq!(report.resumed, ResumeKind::Fallback);
        assert_eq!(report.delta.messages, 1 + 2);

        write(5);
        let report = service.run().unwrap();
        assert_eq!(report.resumed, ResumeKind::Saved);
        assert_eq!(report.delta.messages, 5);
        assert_eq!(report.current.counters.messages, 3 + 6 + 3 + 5);
    }

    #[test]
    fn test_lost_position_without_recovery_skips_to_end() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log");
        let mut config = config(&dir);
        config.recover_lost_position = false;
        let service = counting_all(&config);

        fs::write(&log, "a\n").unwrap();
        assert_eq!(service.run().unwrap().delta.messages, 1);

        fs::rename(&log, dir.path().join("archived")).unwrap();
        fs::write(dir.path().join("log.1"), "old\n").unwrap();
        fs::write(&log, "skipped\n").unwrap();

        let report = service.run().unwrap();
        assert_eq!(report.resumed, ResumeKind::Fallback);
        assert_eq!(report.lines_read, 0);

        append(&log, "seen\n");
        assert_eq!(service.run().unwrap().delta.messages, 1);
    }

    #[test]
    fn test_skip_history_on_first_run() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log");
        let mut config = config(&dir);
        config.skip_history = true;
        let service = counting_all(&config);

        fs::write(&log, "old 1\nold 2\n").unwrap();
        let first = service.run().unwrap();
        assert_eq!(first.lines_read, 0);
        assert_eq!(first.current.position.offset(), Some(12));

        append(&log, "new\n");
        assert_eq!(service.run().unwrap().current.counters.messages, 1);
    }

    #[test]
    fn test_skip_history_with_missing_newest_waits_for_it() {
        let dir = tempdir().unwrap();
        let mut config = config(&dir);
        config.skip_history = true;
        let service = counting_all(&config);

        fs::write(dir.path().join("log.1"), "old 1\nold 2\n").unwrap();
        let first = service.run().unwrap();
        assert_eq!(first.lines_read, 0);
        assert_eq!(first.current.position, PositionToken::End);

        let second = service.run().unwrap();
        assert_eq!(second.resumed, ResumeKind::Saved);
        assert_eq!(second.lines_read, 0);

        fs::write(dir.path().join("log"), "new 1\nnew 2\n").unwrap();
        let third = service.run().unwrap();
        assert_eq!(third.lines_read, 2);
        assert_eq!(third.current.counters.messages, 2);
    }

    #[test]
    fn test_failed_run_commits_nothing() {
        let dir = tempdir().unwrap();
        let config = config(&dir);
        let service = counting_all(&config);

        fs::write(dir.path().join("log"), "one\n").unwrap();
        service.run().unwrap();
        let committed = fs::read(config.state_file_path()).unwrap();

        // The saved file leaves the set, and the fallback start is unreadable.
        fs::rename(dir.path().join("log"), dir.path().join("archived")).unwrap();
        fs::create_dir(dir.path().join("log.1")).unwrap();
        fs::write(dir.path().join("log"), "two\n").unwrap();

        assert!(service.run().is_err());
        assert_eq!(fs::read(config.state_file_path()).unwrap(), committed);
    }

    #[test]
    fn test_corrupt_state_aborts_run() {
        let dir = tempdir().unwrap();
        let config = config(&dir);
        let service = counting_all(&config);

        fs::create_dir_all(dir.path().join("state")).unwrap();
        fs::write(config.state_file_path(), "garbage\n").unwrap();
        fs::write(dir.path().join("log"), "one\n").unwrap();

        assert!(service.run().is_err());
        assert_eq!(
            fs::read_to_string(config.state_file_path()).unwrap(),
            "garbage\n"
        );
    }
}
