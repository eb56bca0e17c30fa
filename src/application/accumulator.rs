//! Drains a cursor and classifies every line into counters.

use crate::domain::{Counters, PersistedState, Result};
use crate::infrastructure::MultiFileCursor;

use super::classifier::ClassifierSet;

/// Outcome of draining a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulation {
    /// Position after the last line read, plus the updated counters.
    pub state: PersistedState,
    /// Lines read during this pass.
    pub lines_read: u64,
    /// Lines that matched at least one classifier.
    pub lines_matched: u64,
}

/// Applies a classifier set to everything a cursor has to offer.
pub struct CounterAccumulator<'a> {
    classifiers: &'a ClassifierSet,
}

impl<'a> CounterAccumulator<'a> {
    /// Create an accumulator using `classifiers`.
    #[must_use]
    pub const fn new(classifiers: &'a ClassifierSet) -> Self {
        Self { classifiers }
    }

    /// Read `cursor` until it is caught up, starting from `counters`.
    ///
    /// The cursor must already be positioned. Nothing is persisted here.
    ///
    /// # Errors
    /// Returns the first cursor error; the partial counts are discarded.
    pub fn accumulate(
        &self,
        cursor: &mut MultiFileCursor,
        mut counters: Counters,
    ) -> Result<Accumulation> {
        let mut lines_read = 0u64;
        let mut lines_matched = 0u64;

        for line in cursor.lines() {
            let line = line?;
            lines_read += 1;
            if self.classifiers.apply(&line, &mut counters) > 0 {
                lines_matched += 1;
            }
        }

        let position = cursor.tell()?;
        tracing::debug!(
            lines_read,
            lines_matched,
            %position,
            file = ?cursor.current_path(),
            "Cursor caught up"
        );

        Ok(Accumulation {
            state: PersistedState::new(position, counters),
            lines_read,
            lines_matched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CounterKind, PositionToken};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_accumulate_counts_and_positions() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log");
        fs::write(&log, "msg\nnoise\nmsg done\n").unwrap();

        let classifiers = ClassifierSet::default()
            .with(CounterKind::Messages, |l: &str| l.starts_with("msg"))
            .with(CounterKind::Completed, |l: &str| l.ends_with("done"));
        let mut cursor = MultiFileCursor::new(vec![log], true);

        let result = CounterAccumulator::new(&classifiers)
            .accumulate(&mut cursor, Counters::default())
            .unwrap();

        assert_eq!(result.lines_read, 3);
        assert_eq!(result.lines_matched, 2);
        assert_eq!(result.state.counters.messages, 2);
        assert_eq!(result.state.counters.completed, 1);
        assert_eq!(result.state.position.offset(), Some(19));
    }

    #[test]
    fn test_accumulate_continues_from_counters() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("log");
        fs::write(&log, "r\n").unwrap();

        let classifiers = ClassifierSet::default().with(CounterKind::Recipients, |_: &str| true);
        let mut cursor = MultiFileCursor::new(vec![log], true);
        let start = Counters {
            recipients: 41,
            ..Default::default()
        };

        let result = CounterAccumulator::new(&classifiers)
            .accumulate(&mut cursor, start)
            .unwrap();
        assert_eq!(result.state.counters.recipients, 42);
    }

    #[test]
    fn test_accumulate_empty_stream() {
        let dir = tempdir().unwrap();
        let classifiers = ClassifierSet::default();
        let mut cursor = MultiFileCursor::new(vec![dir.path().join("log")], true);

        let result = CounterAccumulator::new(&classifiers)
            .accumulate(&mut cursor, Counters::default())
            .unwrap();

        assert_eq!(result.lines_read, 0);
        assert_eq!(result.state.position, PositionToken::Start);
    }
}
