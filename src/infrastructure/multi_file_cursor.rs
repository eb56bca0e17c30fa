//! A forward-only line stream over a set of rotated log files.
//!
//! The file set is ordered oldest to newest, e.g. `[mail.log.2, mail.log.1,
//! mail.log]`. Positions are bound to file identity (device, inode) rather than
//! path, so a position taken before the rotator renames `mail.log` to
//! `mail.log.1` still resolves afterwards. Which file is "newest" is re-resolved
//! from the live file set on every end-of-file, never cached.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::domain::{AppError, FileIdentity, PositionToken, Result};

use super::file_identity::{identity_at_path, identity_of, open_if_present};

/// Result of a single raw line read.
enum ReadOutcome {
    /// A complete, newline-terminated line.
    Line(String),
    /// Bytes after the last newline; the writer may still be mid-line.
    Partial(Vec<u8>),
    /// Nothing left to read right now.
    Eof,
}

/// The file the cursor currently owns.
struct OpenFile {
    path: PathBuf,
    reader: BufReader<File>,
}

impl OpenFile {
    fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            reader: BufReader::new(file),
        }
    }

    fn identity(&self) -> io::Result<FileIdentity> {
        identity_of(self.reader.get_ref())
    }

    fn offset(&mut self) -> io::Result<u64> {
        self.reader.stream_position()
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.reader.get_ref().metadata()?.len())
    }

    /// Seek to `offset`, or to 0 if the file has been truncated below it.
    fn seek_to(&mut self, offset: u64) -> io::Result<u64> {
        let len = self.len()?;
        let target = if offset > len {
            tracing::warn!(
                path = %self.path.display(),
                offset,
                len,
                "File is shorter than saved offset, assuming truncation and reading from start"
            );
            0
        } else {
            offset
        };
        self.reader.seek(SeekFrom::Start(target))
    }

    fn seek_to_end(&mut self) -> io::Result<u64> {
        self.reader.seek(SeekFrom::End(0))
    }

    fn read_line(&mut self) -> io::Result<ReadOutcome> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if buf.last() == Some(&b'\n') {
            Ok(ReadOutcome::Line(decode_line(buf)))
        } else {
            Ok(ReadOutcome::Partial(buf))
        }
    }

    /// Step back over an unterminated tail so it is re-read once complete.
    fn unread(&mut self, len: usize) -> io::Result<()> {
        let offset = self.offset()?;
        self.reader
            .seek(SeekFrom::Start(offset.saturating_sub(len as u64)))?;
        Ok(())
    }

    /// Clear the end-of-file condition so appended bytes become readable.
    ///
    /// Returns true if the file shrank below the read position, in which case
    /// the reader has been moved back to offset 0.
    fn reset_eof(&mut self) -> io::Result<bool> {
        let offset = self.offset()?;
        if self.len()? < offset {
            tracing::warn!(
                path = %self.path.display(),
                offset,
                "Live file truncated in place, restarting from its beginning"
            );
            self.reader.seek(SeekFrom::Start(0))?;
            return Ok(true);
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(false)
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(mut buf: Vec<u8>) -> String {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    String::from_utf8(buf)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn open_error(path: &Path, err: io::Error) -> AppError {
    AppError::io(format!("Failed to open {}", path.display()), err)
}

fn read_error(path: &Path, err: io::Error) -> AppError {
    AppError::io(format!("Failed to read {}", path.display()), err)
}

/// Open the first existing file at or after `from` in the set.
fn open_first_from(files: &[PathBuf], from: usize) -> Result<Option<OpenFile>> {
    for path in files.iter().skip(from) {
        if let Some(file) = open_if_present(path).map_err(|e| open_error(path, e))? {
            tracing::debug!(path = %path.display(), "Opened log file");
            return Ok(Some(OpenFile::new(path.clone(), file)));
        }
    }
    Ok(None)
}

/// Identity of the file currently at the newest path.
fn newest_identity(files: &[PathBuf]) -> Result<Option<FileIdentity>> {
    match files.last() {
        Some(path) => identity_at_path(path).map_err(|e| read_error(path, e)),
        None => Ok(None),
    }
}

/// Index in the set of the file with the given identity.
fn position_in_set(files: &[PathBuf], identity: FileIdentity) -> Result<Option<usize>> {
    for (index, path) in files.iter().enumerate() {
        if identity_at_path(path).map_err(|e| read_error(path, e))? == Some(identity) {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Cursor presenting a rotated file set as one line stream.
pub struct MultiFileCursor {
    files: Vec<PathBuf>,
    recover_lost_position: bool,
    current: Option<OpenFile>,
    awaiting_newest: bool,
}

impl MultiFileCursor {
    /// Create a cursor over `files` (oldest first). Nothing is opened yet.
    ///
    /// `recover_lost_position` picks where reading resumes when the open
    /// file disappears from the set: the oldest file (true) or the end of the
    /// newest (false).
    #[must_use]
    pub const fn new(files: Vec<PathBuf>, recover_lost_position: bool) -> Self {
        Self {
            files,
            recover_lost_position,
            current: None,
            awaiting_newest: false,
        }
    }

    /// Path the current file was opened under, if any.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|open| open.path.as_path())
    }

    /// Token for where the lost-position policy sends the cursor.
    #[must_use]
    pub const fn fallback_position(&self) -> PositionToken {
        if self.recover_lost_position {
            PositionToken::Start
        } else {
            PositionToken::End
        }
    }

    /// Move the cursor to `token` and return the resulting position.
    ///
    /// `End` on a missing newest file leaves the cursor waiting for that file:
    /// the stream stays empty and, once the file appears, it is read from
    /// offset 0. `tell` reports `End` while waiting.
    ///
    /// # Errors
    /// Returns `PositionNotFound` if `token` names a file that is no longer
    /// in the set, or an IO error if a present file cannot be opened.
    pub fn seek(&mut self, token: PositionToken) -> Result<PositionToken> {
        self.awaiting_newest = false;
        match token {
            PositionToken::Start => {
                self.current = None;
                self.current = open_first_from(&self.files, 0)?;
            }
            PositionToken::End => {
                self.current = None;
                if let Some(newest) = self.files.len().checked_sub(1) {
                    self.current = open_first_from(&self.files[newest..], 0)?;
                }
                if let Some(open) = self.current.as_mut() {
                    open.seek_to_end().map_err(|e| read_error(&open.path, e))?;
                } else {
                    self.await_newest();
                }
            }
            PositionToken::At { offset, identity } => self.seek_identity(offset, identity)?,
        }
        self.tell()
    }

    /// Wait for the newest file to appear, then read it from the start.
    ///
    /// Used to resume a committed `End`: the newest file did not exist when
    /// it was taken, so everything in it is new.
    pub fn await_newest(&mut self) -> PositionToken {
        self.current = None;
        self.awaiting_newest = !self.files.is_empty();
        if self.awaiting_newest {
            tracing::debug!("Newest file not present, waiting for it");
            PositionToken::End
        } else {
            PositionToken::Start
        }
    }

    /// Open the newest file at offset 0 if it has appeared.
    fn open_awaited_newest(&mut self) -> Result<()> {
        if let Some(newest) = self.files.len().checked_sub(1) {
            self.current = open_first_from(&self.files[newest..], 0)?;
        }
        if let Some(open) = &self.current {
            tracing::info!(path = %open.path.display(), "Newest file appeared");
            self.awaiting_newest = false;
        }
        Ok(())
    }

    fn seek_identity(&mut self, offset: u64, identity: FileIdentity) -> Result<()> {
        if let Some(open) = self.current.as_mut() {
            if open.identity().map_err(|e| read_error(&open.path, e))? == identity {
                open.seek_to(offset).map_err(|e| read_error(&open.path, e))?;
                return Ok(());
            }
        }

        self.current = None;
        for path in &self.files {
            let Some(file) = open_if_present(path).map_err(|e| open_error(path, e))? else {
                continue;
            };
            if identity_of(&file).map_err(|e| read_error(path, e))? != identity {
                continue;
            }
            let mut open = OpenFile::new(path.clone(), file);
            open.seek_to(offset).map_err(|e| read_error(path, e))?;
            tracing::debug!(path = %path.display(), offset, "Resumed saved position");
            self.current = Some(open);
            return Ok(());
        }

        Err(AppError::PositionNotFound { identity })
    }

    /// Current position: `Start` while no file is open (`End` while waiting
    /// for the newest file), otherwise the byte offset and identity of the
    /// open file, queried now.
    ///
    /// # Errors
    /// Returns error if the open file cannot be queried.
    pub fn tell(&mut self) -> Result<PositionToken> {
        let Some(open) = self.current.as_mut() else {
            if self.awaiting_newest {
                return Ok(PositionToken::End);
            }
            return Ok(PositionToken::Start);
        };
        let offset = open.offset().map_err(|e| read_error(&open.path, e))?;
        let identity = open.identity().map_err(|e| read_error(&open.path, e))?;
        Ok(PositionToken::at(offset, identity))
    }

    /// Next line of the stream, or `None` once caught up.
    ///
    /// `None` is not terminal: a later call returns lines appended since.
    ///
    /// # Errors
    /// Returns an IO error if a present file cannot be opened or read.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        if self.current.is_none() {
            if self.awaiting_newest {
                self.open_awaited_newest()?;
            } else {
                self.seek(PositionToken::Start)?;
            }
        }

        let fallback = self.fallback_position();
        let mut recovered = false;
        loop {
            let Some(open) = self.current.as_mut() else {
                return Ok(None);
            };

            let pending = match open.read_line().map_err(|e| read_error(&open.path, e))? {
                ReadOutcome::Line(line) => return Ok(Some(line)),
                ReadOutcome::Partial(bytes) => Some(bytes),
                ReadOutcome::Eof => None,
            };

            let identity = open.identity().map_err(|e| read_error(&open.path, e))?;
            if newest_identity(&self.files)? == Some(identity) {
                match pending {
                    Some(bytes) => open
                        .unread(bytes.len())
                        .map_err(|e| read_error(&open.path, e))?,
                    None => {
                        if open.reset_eof().map_err(|e| read_error(&open.path, e))? {
                            continue;
                        }
                    }
                }
                return Ok(None);
            }

            let index = position_in_set(&self.files, identity)?;
            let next = match index {
                Some(index) => open_first_from(&self.files, index + 1)?,
                None => None,
            };

            if let Some(bytes) = pending {
                // Until a newer file exists the writer may still finish the line.
                if index.is_some() && next.is_none() {
                    open.unread(bytes.len())
                        .map_err(|e| read_error(&open.path, e))?;
                    return Ok(None);
                }
                return Ok(Some(decode_line(bytes)));
            }

            match (index, next) {
                (Some(_), Some(next)) => {
                    tracing::info!(
                        from = %open.path.display(),
                        to = %next.path.display(),
                        "Finished rotated file, moving to newer file"
                    );
                    self.current = Some(next);
                }
                (Some(_), None) => {
                    open.reset_eof().map_err(|e| read_error(&open.path, e))?;
                    return Ok(None);
                }
                (None, _) => {
                    if recovered {
                        return Ok(None);
                    }
                    recovered = true;
                    tracing::warn!(
                        path = %open.path.display(),
                        %identity,
                        %fallback,
                        "Open file is no longer part of the file set, position lost"
                    );
                    self.seek(fallback)?;
                }
            }
        }
    }

    /// Iterate lines until caught up.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { cursor: self }
    }
}

/// Iterator over the lines currently available from a cursor.
pub struct Lines<'a> {
    cursor: &'a mut MultiFileCursor,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_line().transpose()
    }
}
