//! File identity lookups.
//!
//! Identity comes from a status query on an open descriptor, so a rename
//! between open and stat cannot attribute the wrong identity to a path.

use std::fs::File;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::domain::FileIdentity;

/// Identity of an open file.
///
/// # Errors
/// Returns error if the status query fails.
pub fn identity_of(file: &File) -> io::Result<FileIdentity> {
    let metadata = file.metadata()?;
    Ok(FileIdentity::new(metadata.dev(), metadata.ino()))
}

/// Open a candidate file, treating a missing file as absent.
///
/// # Errors
/// Returns any open failure other than `NotFound`.
pub fn open_if_present(path: &Path) -> io::Result<Option<File>> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::trace!(path = %path.display(), "File not present");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Identity of whatever file currently sits at `path`, if any.
///
/// # Errors
/// Returns any failure other than the file not existing.
pub fn identity_at_path(path: &Path) -> io::Result<Option<FileIdentity>> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(Some(FileIdentity::new(metadata.dev(), metadata.ino()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
