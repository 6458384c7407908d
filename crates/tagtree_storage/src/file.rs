//! Positioned reads over a read-only file.

use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A read-only file supporting positioned reads.
///
/// The seek-then-read pair is performed atomically under an internal mutex,
/// so a `ReadOnlyFile` can be shared by reference across threads. The file
/// length is queried from the filesystem on demand rather than cached,
/// because another handle may be appending concurrently.
#[derive(Debug)]
pub struct ReadOnlyFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl ReadOnlyFile {
    /// Opens the file at `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Returns the current length of the file in bytes.
    ///
    /// This is a live metadata query; a concurrent appender makes the value
    /// grow between calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn len(&self) -> StorageResult<u64> {
        let file = self.file.lock();
        Ok(file.metadata()?.len())
    }

    /// Returns whether the file is currently empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if the requested range crosses
    /// the end of the file, or an I/O error if the read fails.
    pub fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();

        let size = file.metadata()?.len();
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Returns the path this file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
