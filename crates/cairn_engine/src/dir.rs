//! Engine directory management.
//!
//! ```text
//! <storage_path>/
//! ├─ LOCK          # Advisory lock for single-process access
//! ├─ FAMILIES      # Column family registry
//! ├─ JOURNAL       # Write-ahead journal of committed batches
//! ├─ CHECKPOINT    # Full image of the latest values at a sequence number
//! └─ OPTIONS       # Human-readable dump of the effective options
//! ```

use crate::error::{EngineError, EngineResult};
use crate::registry::FamilyRegistry;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const REGISTRY_FILE: &str = "FAMILIES";
const JOURNAL_FILE: &str = "JOURNAL";
const CHECKPOINT_FILE: &str = "CHECKPOINT";
const OPTIONS_FILE: &str = "OPTIONS";

/// Owns the engine directory and its exclusive lock.
#[derive(Debug)]
pub struct EngineDir {
    path: PathBuf,
    lock_file: Mutex<Option<File>>,
}

impl EngineDir {
    /// Opens or creates the directory and takes the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another engine holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> EngineResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(EngineError::invalid_argument(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(EngineError::invalid_argument(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file: Mutex::new(Some(lock_file)),
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal path.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }

    /// Loads the registry, or `None` for a fresh directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load_registry(&self) -> EngineResult<Option<FamilyRegistry>> {
        read_registry(&self.path)
    }

    /// Saves the registry atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any file operation fails.
    pub fn save_registry(&self, registry: &FamilyRegistry) -> EngineResult<()> {
        self.write_atomic(REGISTRY_FILE, &registry.encode()?)
    }

    /// Reads the checkpoint file, or `None` if none was written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_checkpoint(&self) -> EngineResult<Option<Vec<u8>>> {
        read_optional(&self.path.join(CHECKPOINT_FILE))
    }

    /// Replaces the checkpoint file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if any file operation fails.
    pub fn write_checkpoint(&self, data: &[u8]) -> EngineResult<()> {
        self.write_atomic(CHECKPOINT_FILE, data)
    }

    /// Replaces the options dump.
    ///
    /// # Errors
    ///
    /// Returns an error if any file operation fails.
    pub fn write_options(&self, text: &str) -> EngineResult<()> {
        self.write_atomic(OPTIONS_FILE, text.as_bytes())
    }

    /// Releases the directory lock. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the unlock call fails.
    pub fn unlock(&self) -> EngineResult<()> {
        if let Some(file) = self.lock_file.lock().take() {
            FileExt::unlock(&file)?;
        }
        Ok(())
    }

    /// Writes `data` to `name` with write-then-rename:
    /// 1. Write to temporary file
    /// 2. Sync temporary file to disk
    /// 3. Rename over the target
    /// 4. Fsync the directory so the rename is durable
    fn write_atomic(&self, name: &str, data: &[u8]) -> EngineResult<()> {
        let target = self.path.join(name);
        let temp = self.path.join(format!("{name}.tmp"));

        let mut file = File::create(&temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &target)?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> EngineResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Reads the registry of the database at `path` without taking the lock.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or decoded.
pub fn read_registry(path: &Path) -> EngineResult<Option<FamilyRegistry>> {
    match read_optional(&path.join(REGISTRY_FILE))? {
        Some(data) if !data.is_empty() => Ok(Some(FamilyRegistry::decode(&data)?)),
        _ => Ok(None),
    }
}

fn read_optional(path: &Path) -> EngineResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_open_is_locked() {
        let dir = tempdir().unwrap();
        let first = EngineDir::open(dir.path(), true).unwrap();
        assert!(matches!(
            EngineDir::open(dir.path(), true),
            Err(EngineError::Locked)
        ));

        first.unlock().unwrap();
        assert!(EngineDir::open(dir.path(), true).is_ok());
    }

    #[test]
    fn missing_directory_without_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent");
        assert!(EngineDir::open(&path, false).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn registry_round_trip_on_disk() {
        let dir = tempdir().unwrap();
        let engine_dir = EngineDir::open(dir.path(), true).unwrap();
        assert!(engine_dir.load_registry().unwrap().is_none());

        let mut registry = FamilyRegistry::default();
        registry.register(b"extra").unwrap();
        engine_dir.save_registry(&registry).unwrap();

        assert_eq!(read_registry(dir.path()).unwrap(), Some(registry));
        assert!(!dir.path().join("FAMILIES.tmp").exists());
    }
}
