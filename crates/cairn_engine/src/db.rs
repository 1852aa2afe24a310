//! The engine handle.

use crate::backend::FileLog;
use crate::batch::WriteBatch;
use crate::checkpoint::CheckpointImage;
use crate::dir::{self, EngineDir};
use crate::error::{EngineError, EngineResult};
use crate::family::{ColumnFamily, ColumnFamilyHandle, ReadPoint};
use crate::iterator::{DbIterator, IteratorMode};
use crate::journal::{Journal, JournalEntry, JournalRecord};
use crate::locks::LockTable;
use crate::options::{
    render_options_file, ColumnFamilyDescriptor, ColumnFamilyOptions, EngineOptions, ReadOptions,
    TransactionMode, WriteOptions,
};
use crate::registry::FamilyRegistry;
use crate::snapshot::{Snapshot, SnapshotList};
use crate::transaction::Transaction;
use crate::types::{FamilyId, SequenceNumber};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// An open engine.
///
/// Cloning is cheap; every clone refers to the same open database. Data is
/// kept in memory as multi-version column families and made durable by the
/// journal plus periodic checkpoints.
///
/// # Example
///
/// ```rust,ignore
/// use cairn_engine::{ColumnFamilyDescriptor, ColumnFamilyOptions, Engine, EngineOptions};
///
/// let descriptors = vec![ColumnFamilyDescriptor::new("default", ColumnFamilyOptions::default())];
/// let (engine, handles) = Engine::open(path, EngineOptions::default(), &descriptors)?;
/// let mut txn = engine.begin_transaction(Default::default())?;
/// txn.put(&handles[0], b"key", b"value")?;
/// txn.commit()?;
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    dir: EngineDir,
    options: EngineOptions,
    registry: Mutex<FamilyRegistry>,
    families: RwLock<HashMap<FamilyId, ColumnFamilyHandle>>,
    journal: Mutex<Journal>,
    commit_lock: Mutex<()>,
    last_seq: AtomicU64,
    snapshots: Arc<SnapshotList>,
    pub(crate) locks: LockTable,
    next_owner: AtomicU64,
    closed: AtomicBool,
    checkpoint_pending: AtomicBool,
    flusher: Mutex<Option<Flusher>>,
}

enum FlushSignal {
    Checkpoint,
    Shutdown,
}

struct Flusher {
    sender: Sender<FlushSignal>,
    workers: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Opens the engine at `path` with the requested column families.
    ///
    /// Returns one handle per descriptor, in descriptor order. The `default`
    /// family always exists and may be omitted from `descriptors`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory is missing and `create_if_missing` is false
    /// - Another engine holds the lock (`Locked`)
    /// - Families exist on disk that were not requested
    ///   (`ColumnFamiliesNotOpened`)
    /// - A requested family is missing and may not be created
    /// - Recovery finds corruption
    pub fn open(
        path: &Path,
        options: EngineOptions,
        descriptors: &[ColumnFamilyDescriptor],
    ) -> EngineResult<(Self, Vec<ColumnFamilyHandle>)> {
        let dir = EngineDir::open(path, options.create_if_missing)?;
        let existing = dir.load_registry()?;
        let mut changed = existing.is_none();
        let mut registry = existing.unwrap_or_default();

        let unopened: Vec<Vec<u8>> = registry
            .iter()
            .filter(|(id, name)| {
                *id != FamilyId::DEFAULT && !descriptors.iter().any(|d| d.name == *name)
            })
            .map(|(_, name)| name.to_vec())
            .collect();
        if !unopened.is_empty() {
            return Err(EngineError::ColumnFamiliesNotOpened { names: unopened });
        }

        for descriptor in descriptors {
            if registry.id_of(&descriptor.name).is_none() {
                if !options.create_missing_column_families {
                    return Err(EngineError::ColumnFamilyNotFound {
                        name: descriptor.name.clone(),
                    });
                }
                registry.register(&descriptor.name)?;
                changed = true;
            }
        }
        if changed {
            dir.save_registry(&registry)?;
        }

        let mut families = HashMap::new();
        for (id, name) in registry.iter() {
            let family_options = descriptors
                .iter()
                .find(|d| d.name == name)
                .map(|d| d.options.clone())
                .unwrap_or_default();
            families.insert(
                id,
                Arc::new(ColumnFamily::new(id, name.to_vec(), family_options)),
            );
        }

        let mut last = SequenceNumber::default();
        if let Some(data) = dir.read_checkpoint()? {
            let image = CheckpointImage::decode(&data)?;
            for (id, entries) in image.families {
                if let Some(family) = families.get(&id) {
                    for (key, value) in entries {
                        family.apply(image.sequence, &key, Some(value));
                    }
                }
            }
            last = image.sequence;
        }
        let checkpoint_seq = last;

        let mut journal = Journal::new(Box::new(FileLog::open(&dir.journal_path())?));
        let mut replayed = 0usize;
        for record in journal.recover()? {
            let sequence = record.sequence();
            if sequence <= checkpoint_seq {
                continue;
            }
            match record {
                JournalRecord::Batch { entries, .. } => {
                    for entry in entries {
                        if let Some(family) = families.get(&entry.family) {
                            family.apply(sequence, &entry.key, entry.value);
                        }
                    }
                }
                JournalRecord::Reset { family, .. } => {
                    if let Some(old) = families.get(&family) {
                        let fresh = Arc::new(old.emptied());
                        families.insert(family, fresh);
                    }
                }
            }
            last = last.max(sequence);
            replayed += 1;
        }
        info!(
            path = %path.display(),
            families = families.len(),
            checkpoint = %checkpoint_seq,
            replayed,
            sequence = %last,
            "engine opened"
        );

        let mut handles = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let family = registry
                .id_of(&descriptor.name)
                .and_then(|id| families.get(&id))
                .ok_or_else(|| EngineError::ColumnFamilyNotFound {
                    name: descriptor.name.clone(),
                })?;
            handles.push(Arc::clone(family));
        }

        let inner = Arc::new(EngineInner {
            dir,
            options,
            registry: Mutex::new(registry),
            families: RwLock::new(families),
            journal: Mutex::new(journal),
            commit_lock: Mutex::new(()),
            last_seq: AtomicU64::new(last.as_u64()),
            snapshots: Arc::new(SnapshotList::default()),
            locks: LockTable::default(),
            next_owner: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            checkpoint_pending: AtomicBool::new(false),
            flusher: Mutex::new(None),
        });
        inner.write_options_file()?;
        EngineInner::start_flusher(&inner)?;

        Ok((Self { inner }, handles))
    }

    /// Lists the column families of the database at `path`.
    ///
    /// Returns an empty list if no database exists there yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry exists but cannot be read.
    pub fn list_column_families(path: &Path) -> EngineResult<Vec<Vec<u8>>> {
        Ok(dir::read_registry(path)?
            .map(|registry| registry.names())
            .unwrap_or_default())
    }

    /// Returns the engine directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.dir.path()
    }

    /// Returns the options the engine was opened with.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Returns the latest published sequence number.
    #[must_use]
    pub fn latest_sequence(&self) -> SequenceNumber {
        self.inner.latest()
    }

    /// Number of live snapshots, including those pinned by iterators.
    #[must_use]
    pub fn live_snapshots(&self) -> usize {
        self.inner.snapshots.len()
    }

    /// Returns the handle of an open family by name.
    #[must_use]
    pub fn column_family(&self, name: &[u8]) -> Option<ColumnFamilyHandle> {
        let id = self.inner.registry.lock().id_of(name)?;
        self.inner.families.read().get(&id).cloned()
    }

    /// Reads a key.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the engine has been closed.
    pub fn get(
        &self,
        family: &ColumnFamilyHandle,
        key: &[u8],
        read: &ReadOptions,
    ) -> EngineResult<Option<Vec<u8>>> {
        self.inner.get(family, key, read)
    }

    /// Returns the entry with the greatest key `<= key`.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the engine has been closed.
    pub fn seek_for_prev(
        &self,
        family: &ColumnFamilyHandle,
        key: &[u8],
        read: &ReadOptions,
    ) -> EngineResult<Option<(Vec<u8>, Vec<u8>)>> {
        self.inner.ensure_open()?;
        Ok(family.prev_visible(Bound::Included(key), self.inner.read_point(read)))
    }

    /// Creates an ascending iterator.
    ///
    /// Without a snapshot in `read` the iterator pins the current sequence
    /// for its lifetime and never observes later writes.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the engine has been closed.
    pub fn iterator(
        &self,
        family: &ColumnFamilyHandle,
        mode: IteratorMode<'_>,
        read: &ReadOptions,
    ) -> EngineResult<DbIterator> {
        self.inner.iterator(family, mode, read)
    }

    /// Puts a single key.
    ///
    /// # Errors
    ///
    /// See [`Engine::write`].
    pub fn put(
        &self,
        family: &ColumnFamilyHandle,
        key: &[u8],
        value: &[u8],
        options: &WriteOptions,
    ) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(family, key, value);
        self.write(&batch, options)
    }

    /// Deletes a single key.
    ///
    /// # Errors
    ///
    /// See [`Engine::write`].
    pub fn delete(
        &self,
        family: &ColumnFamilyHandle,
        key: &[u8],
        options: &WriteOptions,
    ) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(family, key);
        self.write(&batch, options)
    }

    /// Applies a batch atomically.
    ///
    /// In pessimistic mode the written keys are locked for the duration of
    /// the write, so a batch never interleaves with a transaction holding
    /// one of its keys.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `no_slowdown` is set and a lock is contended (`Incomplete`)
    /// - A key lock cannot be taken in time (`TimedOut`)
    /// - A target family was dropped and missing families are not ignored
    /// - The journal append fails
    pub fn write(&self, batch: &WriteBatch, options: &WriteOptions) -> EngineResult<()> {
        self.inner.ensure_open()?;
        if batch.is_empty() {
            return Ok(());
        }

        if self.inner.options.transaction_mode == TransactionMode::Pessimistic {
            let owner = self.inner.next_owner();
            let wait = (!options.no_slowdown).then_some(self.inner.options.lock_timeout);
            let taken = self.inner.locks.acquire_all(owner, &batch.lock_keys(), wait)?;
            let result = self.inner.commit(batch, options, None);
            self.inner.locks.release(owner, &taken);
            result
        } else {
            self.inner.commit(batch, options, None)
        }
    }

    /// Registers a snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the engine has been closed.
    pub fn snapshot(&self) -> EngineResult<Snapshot> {
        self.inner.ensure_open()?;
        Ok(self.inner.snapshots.acquire_latest(&self.inner.last_seq))
    }

    /// Starts a transaction using the engine's isolation mode.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the engine has been closed.
    pub fn begin_transaction(&self, options: WriteOptions) -> EngineResult<Transaction> {
        self.inner.ensure_open()?;
        Ok(Transaction::new(Arc::clone(&self.inner), options))
    }

    /// Creates a new column family.
    ///
    /// # Errors
    ///
    /// Returns `ColumnFamilyExists` if the name is taken, or an I/O error if
    /// the registry cannot be saved.
    pub fn create_column_family(
        &self,
        descriptor: &ColumnFamilyDescriptor,
    ) -> EngineResult<ColumnFamilyHandle> {
        self.inner.ensure_open()?;
        let _guard = self.inner.commit_lock.lock();

        let family = {
            let mut registry = self.inner.registry.lock();
            let id = registry.register(&descriptor.name)?;
            if let Err(err) = self.inner.dir.save_registry(&registry) {
                registry.remove(id);
                return Err(err);
            }
            Arc::new(ColumnFamily::new(
                id,
                descriptor.name.clone(),
                descriptor.options.clone(),
            ))
        };
        self.inner
            .families
            .write()
            .insert(family.id(), Arc::clone(&family));
        self.inner.write_options_file()?;

        info!(
            family = %String::from_utf8_lossy(&descriptor.name),
            id = %family.id(),
            "column family created"
        );
        Ok(family)
    }

    /// Drops a column family.
    ///
    /// The handle stays readable: iterators already open on it keep their
    /// view. New writes to it fail, or are skipped with
    /// `ignore_missing_column_families`.
    ///
    /// # Errors
    ///
    /// Returns an error if the family is `default`, is already dropped, or the
    /// registry cannot be saved.
    pub fn drop_column_family(&self, family: &ColumnFamilyHandle) -> EngineResult<()> {
        self.inner.ensure_open()?;
        if family.id() == FamilyId::DEFAULT {
            return Err(EngineError::invalid_argument(
                "cannot drop the default column family",
            ));
        }
        let _guard = self.inner.commit_lock.lock();

        {
            let mut registry = self.inner.registry.lock();
            if registry.remove(family.id()).is_none() {
                return Err(EngineError::ColumnFamilyNotFound {
                    name: family.name().to_vec(),
                });
            }
            self.inner.dir.save_registry(&registry)?;
        }
        family.mark_dropped();
        self.inner.families.write().remove(&family.id());

        info!(
            family = %String::from_utf8_lossy(family.name()),
            id = %family.id(),
            "column family dropped"
        );
        Ok(())
    }

    /// Empties a column family in a single step.
    ///
    /// The family keeps its name and id and the returned handle starts empty.
    /// `family` stays readable, so iterators and snapshots taken before the
    /// reset keep draining the old contents. Writes still buffered against
    /// the old handle land in the new family when committed.
    ///
    /// # Errors
    ///
    /// Returns `ColumnFamilyNotFound` if `family` was dropped or already
    /// reset, or an error if the reset cannot be journaled. The family is
    /// left untouched on error.
    pub fn reset_column_family(
        &self,
        family: &ColumnFamilyHandle,
    ) -> EngineResult<ColumnFamilyHandle> {
        self.inner.ensure_open()?;
        let _guard = self.inner.commit_lock.lock();

        let current = self.inner.families.read().get(&family.id()).cloned();
        if !current.is_some_and(|current| Arc::ptr_eq(&current, family)) {
            return Err(EngineError::ColumnFamilyNotFound {
                name: family.name().to_vec(),
            });
        }

        let seq = self.inner.latest().next();
        self.inner.append_record(
            &JournalRecord::Reset {
                sequence: seq,
                family: family.id(),
            },
            &WriteOptions::default(),
        )?;

        let fresh = Arc::new(family.emptied());
        self.inner
            .families
            .write()
            .insert(family.id(), Arc::clone(&fresh));
        family.mark_dropped();
        self.inner.last_seq.store(seq.as_u64(), Ordering::Release);

        info!(
            family = %String::from_utf8_lossy(family.name()),
            id = %family.id(),
            sequence = %seq,
            "column family reset"
        );
        Ok(fresh)
    }

    /// Writes a checkpoint and truncates the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be written.
    pub fn checkpoint(&self) -> EngineResult<()> {
        self.inner.ensure_open()?;
        self.inner.checkpoint()
    }

    /// Returns `true` once [`Engine::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closes the engine: stops background workers, writes a final
    /// checkpoint and releases the directory lock. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the final checkpoint or unlock fails.
    pub fn close(&self) -> EngineResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.stop_flusher(true);
        let checkpoint = self.inner.checkpoint();
        let unlock = self.inner.dir.unlock();
        info!(path = %self.inner.dir.path().display(), "engine closed");
        checkpoint.and(unlock)
    }
}

impl EngineInner {
    pub(crate) fn ensure_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    pub(crate) fn latest(&self) -> SequenceNumber {
        SequenceNumber::new(self.last_seq.load(Ordering::Acquire))
    }

    pub(crate) fn next_owner(&self) -> u64 {
        self.next_owner.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn lock_timeout(&self) -> std::time::Duration {
        self.options.lock_timeout
    }

    pub(crate) fn mode(&self) -> TransactionMode {
        self.options.transaction_mode
    }

    pub(crate) fn read_point(&self, read: &ReadOptions) -> ReadPoint<'_> {
        match read.snapshot {
            Some(seq) => ReadPoint::At(seq),
            None => ReadPoint::Latest(&self.last_seq),
        }
    }

    pub(crate) fn get(
        &self,
        family: &ColumnFamilyHandle,
        key: &[u8],
        read: &ReadOptions,
    ) -> EngineResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(family.get_at(key, self.read_point(read)))
    }

    pub(crate) fn iterator(
        &self,
        family: &ColumnFamilyHandle,
        mode: IteratorMode<'_>,
        read: &ReadOptions,
    ) -> EngineResult<DbIterator> {
        self.ensure_open()?;
        let iter = match read.snapshot {
            Some(seq) => DbIterator::new(Arc::clone(family), seq, mode, None),
            None => {
                let pin = self.snapshots.acquire_latest(&self.last_seq);
                DbIterator::new(Arc::clone(family), pin.sequence(), mode, Some(pin))
            }
        };
        Ok(iter)
    }

    /// Appends `batch` to the journal, applies it and publishes its
    /// sequence. With `validate_since`, fails with `Busy` if any written key
    /// changed after that sequence.
    pub(crate) fn commit(
        &self,
        batch: &WriteBatch,
        options: &WriteOptions,
        validate_since: Option<SequenceNumber>,
    ) -> EngineResult<()> {
        self.ensure_open()?;
        if batch.is_empty() {
            return Ok(());
        }

        let guard = if options.no_slowdown {
            self.commit_lock.try_lock().ok_or(EngineError::Incomplete)?
        } else {
            self.commit_lock.lock()
        };

        let mut entries = Vec::with_capacity(batch.len());
        let mut targets = Vec::with_capacity(batch.len());
        for op in batch.ops() {
            let Some(family) = self.live_family(&op.family) else {
                if options.ignore_missing_column_families {
                    continue;
                }
                return Err(EngineError::ColumnFamilyNotFound {
                    name: op.family.name().to_vec(),
                });
            };
            if let Some(since) = validate_since {
                if family
                    .latest_sequence_of(&op.key)
                    .is_some_and(|seq| seq > since)
                {
                    return Err(EngineError::Busy {
                        family_id: family.id().as_u32(),
                    });
                }
            }
            entries.push(JournalEntry {
                family: family.id(),
                key: op.key.clone(),
                value: op.value.clone(),
            });
            targets.push((family, op));
        }
        if entries.is_empty() {
            return Ok(());
        }

        let seq = self.latest().next();
        let journal_size = self.append_record(
            &JournalRecord::Batch {
                sequence: seq,
                entries,
            },
            options,
        )?;

        for (family, op) in targets {
            family.apply(seq, &op.key, op.value.clone());
        }
        self.last_seq.store(seq.as_u64(), Ordering::Release);
        drop(guard);

        if journal_size > self.options.write_buffer_size {
            self.schedule_checkpoint();
        }
        Ok(())
    }

    /// Journals `record`, syncing when asked to, and returns the journal
    /// size. Caller holds `commit_lock`.
    ///
    /// A record that cannot be made durable is cut from the journal again,
    /// so a failed commit never resurfaces at recovery.
    fn append_record(&self, record: &JournalRecord, options: &WriteOptions) -> EngineResult<u64> {
        let mut journal = self.journal.lock();
        let offset = journal.append(record)?;
        if options.sync || self.options.sync_on_commit {
            if let Err(err) = journal.sync() {
                if let Err(rewind) = journal.rewind(offset) {
                    warn!(error = %rewind, offset, "failed to rewind journal after sync error");
                }
                return Err(err);
            }
        }
        Ok(journal.size())
    }

    /// Current handle of the family `handle` refers to.
    ///
    /// A reset family resolves to its replacement; a dropped one to `None`.
    fn live_family(&self, handle: &ColumnFamilyHandle) -> Option<ColumnFamilyHandle> {
        if !handle.is_dropped() {
            return Some(Arc::clone(handle));
        }
        self.families
            .read()
            .get(&handle.id())
            .filter(|family| !family.is_dropped())
            .cloned()
    }

    fn schedule_checkpoint(&self) {
        if self.checkpoint_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let queued = self
            .flusher
            .lock()
            .as_ref()
            .is_some_and(|flusher| flusher.sender.send(FlushSignal::Checkpoint).is_ok());
        if !queued {
            if let Err(err) = self.checkpoint() {
                warn!(error = %err, "inline checkpoint failed");
            }
        }
    }

    pub(crate) fn checkpoint(&self) -> EngineResult<()> {
        let _guard = self.commit_lock.lock();
        self.checkpoint_pending.store(false, Ordering::Release);

        let seq = self.latest();
        let horizon = self.snapshots.horizon(seq);
        let mut families: Vec<ColumnFamilyHandle> =
            self.families.read().values().cloned().collect();
        families.sort_by_key(|family| family.id());

        let mut pruned = 0usize;
        let mut image = CheckpointImage {
            sequence: seq,
            families: Vec::with_capacity(families.len()),
        };
        for family in &families {
            pruned += family.prune(horizon);
            image.families.push((family.id(), family.entries_at(seq)));
        }

        self.dir.write_checkpoint(&image.encode()?)?;
        self.journal.lock().clear()?;
        debug!(sequence = %seq, horizon = %horizon, pruned, "checkpoint written");
        Ok(())
    }

    fn write_options_file(&self) -> EngineResult<()> {
        let mut families: Vec<ColumnFamilyHandle> =
            self.families.read().values().cloned().collect();
        families.sort_by_key(|family| family.id());
        let listing: Vec<(Vec<u8>, ColumnFamilyOptions)> = families
            .iter()
            .map(|family| (family.name().to_vec(), family.options().clone()))
            .collect();
        self.dir
            .write_options(&render_options_file(&self.options, &listing))
    }

    fn start_flusher(inner: &Arc<Self>) -> EngineResult<()> {
        let count = inner.options.background_threads;
        if count == 0 {
            return Ok(());
        }

        let (sender, receiver) = channel::unbounded();
        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let receiver = receiver.clone();
            let weak = Arc::downgrade(inner);
            let handle = thread::Builder::new()
                .name(format!("cairn-flush-{index}"))
                .spawn(move || flush_worker(&weak, &receiver))?;
            workers.push(handle);
        }
        debug!(workers = count, "background checkpoint workers started");
        *inner.flusher.lock() = Some(Flusher { sender, workers });
        Ok(())
    }

    /// Signals every worker to exit, joining them when `join` is set.
    fn stop_flusher(&self, join: bool) {
        let Some(flusher) = self.flusher.lock().take() else {
            return;
        };
        for _ in &flusher.workers {
            let _ = flusher.sender.send(FlushSignal::Shutdown);
        }
        if join {
            for worker in flusher.workers {
                if worker.join().is_err() {
                    warn!("background checkpoint worker panicked");
                }
            }
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        // May run on a worker thread, so workers are signalled but not joined.
        self.stop_flusher(false);
    }
}

fn flush_worker(inner: &Weak<EngineInner>, receiver: &Receiver<FlushSignal>) {
    for signal in receiver.iter() {
        match signal {
            FlushSignal::Shutdown => break,
            FlushSignal::Checkpoint => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if inner.closed.load(Ordering::Acquire) {
                    continue;
                }
                if let Err(err) = inner.checkpoint() {
                    warn!(error = %err, "background checkpoint failed");
                }
            }
        }
    }
}
