//! Durability helpers.
//!
//! Renaming a file updates its directory entry, so the directory has to be
//! synced too before a commit is durable.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Sync a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Sync a directory so entries created or renamed in it survive a crash.
///
/// # Errors
/// Returns an error if the directory cannot be opened or synced.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}
