//! Append-only byte logs backing the journal.
//!
//! A log is an **opaque byte store**: it appends, reads back and truncates,
//! and knows nothing about the record envelope written on top of it.

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// An append-only byte log.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` makes every appended byte durable
pub trait LogBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read extends past the end or I/O fails.
    fn read_at(&self, offset: u64, len: usize) -> EngineResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    ///
    /// On failure nothing of `data` remains in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> EngineResult<u64>;

    /// Forces appended data and file metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> EngineResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> u64;

    /// Truncates the log to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` exceeds the current size or I/O fails.
    fn truncate(&mut self, new_size: u64) -> EngineResult<()>;
}

/// A log stored in a single file.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileLog {
    /// Opens or creates the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
        })
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogBackend for FileLog {
    fn read_at(&self, offset: u64, len: usize) -> EngineResult<Vec<u8>> {
        check_bounds(offset, len, self.size)?;
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> EngineResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let end = offset + data.len() as u64;
        let file = self.file.get_mut();
        if let Err(err) = write_at(file, offset, data) {
            if let Err(cleanup) = file.set_len(offset) {
                warn!(
                    path = %self.path.display(),
                    offset,
                    error = %cleanup,
                    "failed to cut torn append from log"
                );
            }
            return Err(err.into());
        }
        self.size = end;
        Ok(offset)
    }

    fn sync(&mut self) -> EngineResult<()> {
        self.file.get_mut().sync_all()?;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn truncate(&mut self, new_size: u64) -> EngineResult<()> {
        if new_size > self.size {
            return Err(EngineError::invalid_argument(format!(
                "cannot truncate log to {new_size} bytes, current size is {}",
                self.size
            )));
        }

        let file = self.file.get_mut();
        file.set_len(new_size)?;
        file.sync_all()?;
        self.size = new_size;
        Ok(())
    }
}

/// A log held in memory, for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryLog {
    data: Vec<u8>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns mutable access to the raw contents, for corruption tests.
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

impl LogBackend for MemoryLog {
    fn read_at(&self, offset: u64, len: usize) -> EngineResult<Vec<u8>> {
        check_bounds(offset, len, self.data.len() as u64)?;
        let start = offset as usize;
        Ok(self.data[start..start + len].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> EngineResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(data);
        Ok(offset)
    }

    fn sync(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn truncate(&mut self, new_size: u64) -> EngineResult<()> {
        if new_size > self.data.len() as u64 {
            return Err(EngineError::invalid_argument(format!(
                "cannot truncate log to {new_size} bytes, current size is {}",
                self.data.len()
            )));
        }
        self.data.truncate(new_size as usize);
        Ok(())
    }
}

/// Writes `data` at `offset` and cuts anything left past it.
fn write_at(file: &mut File, offset: u64, data: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    file.flush()?;
    // Bytes past the logical end are left over from a torn write.
    let end = offset + data.len() as u64;
    if file.metadata()?.len() > end {
        file.set_len(end)?;
    }
    Ok(())
}

fn check_bounds(offset: u64, len: usize, size: u64) -> EngineResult<()> {
    let end = offset.saturating_add(len as u64);
    if offset > size || end > size {
        return Err(EngineError::corruption(format!(
            "read beyond end of log: offset {offset}, len {len}, size {size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.bin");

        let mut log = FileLog::open(&path).unwrap();
        assert_eq!(log.append(b"hello").unwrap(), 0);
        assert_eq!(log.append(b" world").unwrap(), 5);
        assert_eq!(log.size(), 11);
        assert_eq!(log.read_at(0, 11).unwrap(), b"hello world");
    }

    #[test]
    fn file_reopen_keeps_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.bin");

        {
            let mut log = FileLog::open(&path).unwrap();
            log.append(b"persistent").unwrap();
            log.sync().unwrap();
        }

        let log = FileLog::open(&path).unwrap();
        assert_eq!(log.size(), 10);
        assert_eq!(log.read_at(0, 10).unwrap(), b"persistent");
    }

    #[test]
    fn file_truncate() {
        let dir = tempdir().unwrap();
        let mut log = FileLog::open(&dir.path().join("log.bin")).unwrap();
        log.append(b"0123456789").unwrap();
        log.truncate(4).unwrap();
        assert_eq!(log.size(), 4);
        assert!(log.truncate(8).is_err());
    }

    #[test]
    fn append_overwrites_bytes_past_the_logical_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.bin");
        let mut log = FileLog::open(&path).unwrap();
        log.append(b"first").unwrap();

        // Leftover of an append that failed half way.
        let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
        raw.write_all(b"torn-bytes-from-a-failed-write").unwrap();
        drop(raw);

        assert_eq!(log.append(b"second").unwrap(), 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"firstsecond");
        assert_eq!(log.size(), 11);
    }

    #[test]
    fn memory_read_past_end() {
        let mut log = MemoryLog::new();
        log.append(b"abc").unwrap();
        assert!(log.read_at(1, 5).is_err());
        assert_eq!(log.read_at(1, 2).unwrap(), b"bc");
    }
}
