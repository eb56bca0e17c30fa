//! Counters and the persisted state record.
//!
//! The state file is line oriented, one field per line:
//!
//! ```text
//! <offset> <device> <inode>
//! <messages>
//! <recipients>
//! <completed>
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::position::{FileIdentity, PositionToken};

/// The counters a classifier can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    /// Message accepted for delivery.
    Messages,
    /// Recipient accepted or routed.
    Recipients,
    /// Message delivery completed.
    Completed,
}

impl CounterKind {
    /// All counters, in state file order.
    pub const ALL: [Self; 3] = [Self::Messages, Self::Recipients, Self::Completed];

    /// Counter name as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Recipients => "recipients",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "messages" => Ok(Self::Messages),
            "recipients" => Ok(Self::Recipients),
            "completed" => Ok(Self::Completed),
            _ => Err(format!(
                "Unknown counter: {s}. Use: messages, recipients, completed"
            )),
        }
    }
}

/// Monotonic line counters.
///
/// Increments wrap at `u64::MAX`, like an SNMP `Counter64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub messages: u64,
    pub recipients: u64,
    pub completed: u64,
}

impl Counters {
    /// Increment one counter by one.
    pub fn increment(&mut self, kind: CounterKind) {
        let slot = self.slot_mut(kind);
        *slot = slot.wrapping_add(1);
    }

    /// Current value of one counter.
    #[must_use]
    pub const fn get(&self, kind: CounterKind) -> u64 {
        match kind {
            CounterKind::Messages => self.messages,
            CounterKind::Recipients => self.recipients,
            CounterKind::Completed => self.completed,
        }
    }

    /// Per-counter difference from an earlier snapshot, wrap-aware.
    #[must_use]
    pub const fn delta_since(&self, earlier: &Self) -> Self {
        Self {
            messages: self.messages.wrapping_sub(earlier.messages),
            recipients: self.recipients.wrapping_sub(earlier.recipients),
            completed: self.completed.wrapping_sub(earlier.completed),
        }
    }

    fn slot_mut(&mut self, kind: CounterKind) -> &mut u64 {
        match kind {
            CounterKind::Messages => &mut self.messages,
            CounterKind::Recipients => &mut self.recipients,
            CounterKind::Completed => &mut self.completed,
        }
    }
}

/// Offset marking the `End` sentinel in the state file.
const END_OFFSET: u64 = u64::MAX;

/// Durable record of one log stream's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Where the next run resumes.
    pub position: PositionToken,
    /// Counter values at that position.
    pub counters: Counters,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            position: PositionToken::Start,
            counters: Counters::default(),
        }
    }
}

impl PersistedState {
    /// Create a state record.
    #[must_use]
    pub const fn new(position: PositionToken, counters: Counters) -> Self {
        Self { position, counters }
    }

    /// Render the state file payload.
    ///
    /// Sentinels use device 0 and inode 0, which no real file has: `Start`
    /// is written as `0 0 0`, and `End` (waiting for the newest file to
    /// appear) carries offset `u64::MAX`.
    #[must_use]
    pub fn to_file_string(&self) -> String {
        let (offset, device, inode) = match self.position {
            PositionToken::At { offset, identity } => (offset, identity.device, identity.inode),
            PositionToken::Start => (0, 0, 0),
            PositionToken::End => (END_OFFSET, 0, 0),
        };

        format!(
            "{offset} {device} {inode}\n{}\n{}\n{}\n",
            self.counters.messages, self.counters.recipients, self.counters.completed
        )
    }

    /// Parse a state file payload.
    ///
    /// # Errors
    /// Returns a description of the first malformed field.
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut lines = content.lines();

        let position_line = lines.next().ok_or("missing position line")?;
        let fields: Vec<&str> = position_line.split_whitespace().collect();
        let [offset, device, inode] = fields.as_slice() else {
            return Err(format!(
                "position line must have 3 fields, found {}",
                fields.len()
            ));
        };
        let offset = parse_field("offset", offset)?;
        let identity = FileIdentity::new(parse_field("device", device)?, parse_field("inode", inode)?);

        let position = if identity.device != 0 || identity.inode != 0 {
            PositionToken::at(offset, identity)
        } else if offset == END_OFFSET {
            PositionToken::End
        } else {
            PositionToken::Start
        };

        let mut counters = Counters::default();
        for kind in CounterKind::ALL {
            let line = lines
                .next()
                .ok_or_else(|| format!("missing {kind} line"))?;
            *counters.slot_mut(kind) = parse_field(kind.as_str(), line.trim())?;
        }

        if lines.any(|line| !line.trim().is_empty()) {
            return Err("unexpected trailing content".into());
        }

        Ok(Self { position, counters })
    }
}

fn parse_field(name: &str, value: &str) -> Result<u64, String> {
    value
        .parse()
        .map_err(|e| format!("invalid {name} '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_wraps() {
        let mut counters = Counters {
            messages: u64::MAX,
            ..Default::default()
        };
        counters.increment(CounterKind::Messages);
        counters.increment(CounterKind::Completed);
        assert_eq!(counters.messages, 0);
        assert_eq!(counters.completed, 1);
        assert_eq!(counters.recipients, 0);
    }

    #[test]
    fn test_delta_across_wrap() {
        let earlier = Counters {
            messages: u64::MAX - 1,
            ..Default::default()
        };
        let later = Counters {
            messages: 2,
            recipients: 5,
            ..Default::default()
        };
        let delta = later.delta_since(&earlier);
        assert_eq!(delta.messages, 4);
        assert_eq!(delta.recipients, 5);
    }

    #[test]
    fn test_file_format() {
        let state = PersistedState::new(
            PositionToken::at(1234, FileIdentity::new(2049, 77)),
            Counters {
                messages: 3,
                recipients: 0,
                completed: 1,
            },
        );
        assert_eq!(state.to_file_string(), "1234 2049 77\n3\n0\n1\n");
        assert_eq!(PersistedState::parse(&state.to_file_string()).unwrap(), state);
    }

    #[test]
    fn test_start_sentinel() {
        let state = PersistedState::default();
        assert_eq!(state.to_file_string(), "0 0 0\n0\n0\n0\n");
        let parsed = PersistedState::parse("0 0 0\n5\n6\n7\n").unwrap();
        assert_eq!(parsed.position, PositionToken::Start);
        assert_eq!(parsed.counters.recipients, 6);
    }

    #[test]
    fn test_end_sentinel() {
        let state = PersistedState::new(PositionToken::End, Counters::default());
        assert_eq!(state.to_file_string(), "18446744073709551615 0 0\n0\n0\n0\n");
        assert_eq!(PersistedState::parse(&state.to_file_string()).unwrap(), state);
    }

    #[test]
    fn test_zero_offset_in_real_file_is_not_start() {
        let parsed = PersistedState::parse("0 8 9\n0\n0\n0\n").unwrap();
        assert_eq!(
            parsed.position,
            PositionToken::at(0, FileIdentity::new(8, 9))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PersistedState::parse("").is_err());
        assert!(PersistedState::parse("1 2\n0\n0\n0\n").is_err());
        assert!(PersistedState::parse("1 2 3\n0\n0\n").is_err());
        assert!(PersistedState::parse("1 2 3\n0\nx\n0\n").is_err());
        assert!(PersistedState::parse("1 2 3\n0\n-1\n0\n").is_err());
        assert!(PersistedState::parse("1 2 3\n0\n0\n0\n9\n").is_err());
    }

    #[test]
    fn test_parse_tolerates_crlf_and_trailing_blank() {
        let parsed = PersistedState::parse("10 1 2\r\n1\r\n2\r\n3\r\n\n").unwrap();
        assert_eq!(parsed.counters.completed, 3);
        assert_eq!(parsed.position.offset(), Some(10));
    }

    #[test]
    fn test_counter_kind_parse() {
        assert_eq!("Messages".parse::<CounterKind>().unwrap(), CounterKind::Messages);
        assert!("bounced".parse::<CounterKind>().is_err());
    }
}
