//! Engine, column family, read and write options.

use crate::snapshot::Snapshot;
use crate::types::SequenceNumber;
use std::fmt::Write as _;
use std::time::Duration;

/// How concurrent transactions are isolated from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Conflicts are detected at commit time; a transaction whose written
    /// keys changed after it began fails with `Busy`.
    Optimistic,
    /// Written keys are locked at `put`/`delete` time and held until the
    /// transaction finishes.
    Pessimistic,
}

impl TransactionMode {
    /// Returns a short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Optimistic => "optimistic",
            Self::Pessimistic => "pessimistic",
        }
    }
}

/// Configuration for opening an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to create requested column families that don't exist yet.
    pub create_missing_column_families: bool,

    /// Maximum number of open files; `-1` means unlimited.
    pub max_open_files: i32,

    /// Journal size that triggers a checkpoint.
    pub write_buffer_size: u64,

    /// Number of background checkpoint workers. Zero checkpoints inline.
    pub background_threads: usize,

    /// How long a pessimistic transaction waits for a key lock.
    pub lock_timeout: Duration,

    /// Whether to sync the journal on every commit.
    pub sync_on_commit: bool,

    /// Isolation strategy for transactions.
    pub transaction_mode: TransactionMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            create_missing_column_families: true,
            max_open_files: 1024,
            write_buffer_size: 64 * 1024 * 1024, // 64 MB
            background_threads: 0,
            lock_timeout: Duration::from_millis(1000),
            sync_on_commit: false,
            transaction_mode: TransactionMode::Optimistic,
        }
    }
}

impl EngineOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to create requested families that are missing.
    #[must_use]
    pub const fn create_missing_column_families(mut self, value: bool) -> Self {
        self.create_missing_column_families = value;
        self
    }

    /// Sets the maximum number of open files.
    #[must_use]
    pub const fn max_open_files(mut self, value: i32) -> Self {
        self.max_open_files = value;
        self
    }

    /// Sets the journal size that triggers a checkpoint.
    #[must_use]
    pub const fn write_buffer_size(mut self, size: u64) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Sets the number of background checkpoint workers.
    #[must_use]
    pub const fn background_threads(mut self, count: usize) -> Self {
        self.background_threads = count;
        self
    }

    /// Sets the key lock timeout for pessimistic transactions.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the transaction isolation strategy.
    #[must_use]
    pub const fn transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }
}

/// Per-family tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFamilyOptions {
    /// Read cache budget in bytes.
    pub cache_size: u64,
    /// Store large values separately from keys.
    pub blob_files: bool,
    /// Garbage-collect separated values during compaction.
    pub blob_garbage_collection: bool,
}

impl Default for ColumnFamilyOptions {
    fn default() -> Self {
        Self {
            cache_size: 8 * 1024 * 1024,
            blob_files: false,
            blob_garbage_collection: false,
        }
    }
}

impl ColumnFamilyOptions {
    /// Sets the read cache budget.
    #[must_use]
    pub const fn cache_size(mut self, bytes: u64) -> Self {
        self.cache_size = bytes;
        self
    }

    /// Enables or disables value separation.
    #[must_use]
    pub const fn blob_files(mut self, enabled: bool, garbage_collection: bool) -> Self {
        self.blob_files = enabled;
        self.blob_garbage_collection = enabled && garbage_collection;
        self
    }
}

/// Name plus options of a column family to open or create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFamilyDescriptor {
    /// Raw family name.
    pub name: Vec<u8>,
    /// Family tuning.
    pub options: ColumnFamilyOptions,
}

impl ColumnFamilyDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<Vec<u8>>, options: ColumnFamilyOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

/// Options for a single read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub(crate) snapshot: Option<SequenceNumber>,
}

impl ReadOptions {
    /// Reads at the point in time captured by `snapshot`.
    ///
    /// The caller keeps `snapshot` alive for as long as the read (or an
    /// iterator created with these options) is in use.
    #[must_use]
    pub fn with_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            snapshot: Some(snapshot.sequence()),
        }
    }

    /// Returns the pinned sequence, if any.
    #[must_use]
    pub fn snapshot_sequence(&self) -> Option<SequenceNumber> {
        self.snapshot
    }
}

/// Options for a single write or commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Sync the journal before returning.
    pub sync: bool,
    /// Fail with `Incomplete` instead of waiting for the commit lock.
    pub no_slowdown: bool,
    /// Skip operations whose family has been dropped.
    pub ignore_missing_column_families: bool,
}

impl WriteOptions {
    /// Creates default write options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    /// Sets whether to avoid waiting.
    #[must_use]
    pub const fn no_slowdown(mut self, value: bool) -> Self {
        self.no_slowdown = value;
        self
    }

    /// Sets whether to skip dropped families.
    #[must_use]
    pub const fn ignore_missing_column_families(mut self, value: bool) -> Self {
        self.ignore_missing_column_families = value;
        self
    }
}

/// Renders the human-readable `OPTIONS` file.
pub(crate) fn render_options_file(
    options: &EngineOptions,
    families: &[(Vec<u8>, ColumnFamilyOptions)],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# cairn engine options");
    let _ = writeln!(out, "[engine]");
    let _ = writeln!(out, "max_open_files={}", options.max_open_files);
    let _ = writeln!(out, "write_buffer_size={}", options.write_buffer_size);
    let _ = writeln!(out, "background_threads={}", options.background_threads);
    let _ = writeln!(out, "lock_timeout_ms={}", options.lock_timeout.as_millis());
    let _ = writeln!(out, "sync_on_commit={}", options.sync_on_commit);
    let _ = writeln!(out, "transaction_mode={}", options.transaction_mode.as_str());
    for (name, family) in families {
        let _ = writeln!(out);
        let _ = writeln!(out, "[family \"{}\"]", String::from_utf8_lossy(name));
        let _ = writeln!(out, "cache_size={}", family.cache_size);
        let _ = writeln!(out, "blob_files={}", family.blob_files);
        let _ = writeln!(
            out,
            "blob_garbage_collection={}",
            family.blob_garbage_collection
        );
    }
    out
}
