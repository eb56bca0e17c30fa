//! File identity and resume position types.
//!
//! A position is tied to a physical file through its (device, inode) pair,
//! never through its path, so it survives a rename by the log rotator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a physical file: device id plus inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    /// Device ID.
    pub device: u64,
    /// Inode number.
    pub inode: u64,
}

impl FileIdentity {
    /// Create an identity from raw device and inode values.
    #[must_use]
    pub const fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.inode)
    }
}

/// Opaque resume position within one file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionToken {
    /// Beginning of the oldest existing file. Also what `tell` reports while
    /// no file is open yet.
    Start,
    /// End of the newest existing file. Never persisted.
    End,
    /// A byte offset within a specific physical file.
    At {
        offset: u64,
        identity: FileIdentity,
    },
}

impl PositionToken {
    /// Token for a byte offset in the given file.
    #[must_use]
    pub const fn at(offset: u64, identity: FileIdentity) -> Self {
        Self::At { offset, identity }
    }

    /// Byte offset, if this token points into a file.
    #[cfg(test)]
    #[must_use]
    pub const fn offset(&self) -> Option<u64> {
        match self {
            Self::At { offset, .. } => Some(*offset),
            Self::Start | Self::End => None,
        }
    }

    /// File identity, if this token points into a file.
    #[cfg(test)]
    #[must_use]
    pub const fn identity(&self) -> Option<FileIdentity> {
        match self {
            Self::At { identity, .. } => Some(*identity),
            Self::Start | Self::End => None,
        }
    }
}

impl fmt::Display for PositionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
            Self::At { offset, identity } => write!(f, "{identity}@{offset}"),
        }
    }
}
