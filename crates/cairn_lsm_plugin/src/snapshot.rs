//! Point-in-time snapshots of `COMPACT` storage.
//!
//! A [`LsmColumnarSnapshot`] reads the engine at the sequence pinned by a
//! [`SnapshotMarker`], overlaid with the writes buffered in its own
//! [`LsmSnapshotTransaction`]. Nothing written to a snapshot ever reaches the
//! storage. Cloning a snapshot shares the marker, so the engine snapshot is
//! released when the last clone closes.

use crate::error::storage_error;
use cairn_engine::{
    ColumnFamilyHandle, Engine, IteratorMode, ReadOptions, Snapshot, Transaction, WriteOptions,
};
use cairn_plugin_api::{
    KeyValueStream, NearestKeyValue, SegmentIdentifier, SegmentedKeyValueStorage,
    SegmentedKeyValueStorageTransaction, SnappedKeyValueStorage, StorageError, StorageResult,
    ValidatingTransaction,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

type Families = Arc<HashMap<SegmentIdentifier, ColumnFamilyHandle>>;

#[derive(Debug)]
struct MarkerState {
    snapshot: Option<Snapshot>,
    usages: usize,
}

/// An engine snapshot shared by reference count.
#[derive(Debug)]
pub struct SnapshotMarker {
    state: Mutex<MarkerState>,
}

impl SnapshotMarker {
    /// Wraps `snapshot` with no users yet.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(MarkerState {
                snapshot: Some(snapshot),
                usages: 0,
            }),
        }
    }

    /// Registers one more user and returns read options pinned to the
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` once the snapshot has been released.
    pub fn mark_and_use(&self) -> StorageResult<ReadOptions> {
        let mut state = self.state.lock();
        let read = state
            .snapshot
            .as_ref()
            .map(ReadOptions::with_snapshot)
            .ok_or_else(|| StorageError::illegal_state("Snapshot has already been released"))?;
        state.usages += 1;
        Ok(read)
    }

    /// Drops one user; the last one releases the engine snapshot.
    pub fn unmark(&self) {
        let mut state = self.state.lock();
        state.usages = state.usages.saturating_sub(1);
        if state.usages == 0 {
            if let Some(snapshot) = state.snapshot.take() {
                debug!(sequence = %snapshot.sequence(), "snapshot released");
            }
        }
    }

    /// Number of current users.
    #[must_use]
    pub fn usages(&self) -> usize {
        self.state.lock().usages
    }

    /// Returns `true` once the engine snapshot has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.lock().snapshot.is_none()
    }
}

/// A write buffer laid over a snapshot.
///
/// Reads see the snapshot plus the buffer; `commit` does nothing and
/// `rollback` discards the buffer and closes the transaction.
pub struct LsmSnapshotTransaction {
    engine: Engine,
    families: Families,
    marker: Arc<SnapshotMarker>,
    read: ReadOptions,
    txn: Transaction,
    closed: bool,
}

impl LsmSnapshotTransaction {
    fn new(engine: Engine, families: Families, marker: Arc<SnapshotMarker>) -> StorageResult<Self> {
        let read = marker.mark_and_use()?;
        let txn = match engine.begin_transaction(WriteOptions::default()) {
            Ok(txn) => txn,
            Err(err) => {
                marker.unmark();
                return Err(storage_error(err));
            }
        };
        Ok(Self {
            engine,
            families,
            marker,
            read,
            txn,
            closed: false,
        })
    }

    /// Marker shared with every copy of this transaction.
    #[must_use]
    pub fn marker(&self) -> &Arc<SnapshotMarker> {
        &self.marker
    }

    /// Returns `true` once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn throw_if_closed(&self) -> StorageResult<()> {
        if self.closed {
            error!("Attempting to use a closed snapshot transaction");
            return Err(StorageError::illegal_state("Storage has already been closed"));
        }
        Ok(())
    }

    fn family(&self, segment: &SegmentIdentifier) -> StorageResult<ColumnFamilyHandle> {
        self.families.get(segment).cloned().ok_or_else(|| {
            StorageError::illegal_state(format!(
                "Segment {} is not part of this snapshot",
                segment.for_display()
            ))
        })
    }

    /// Reads `key` from the snapshot and the buffer.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if closed.
    pub fn get(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.throw_if_closed()?;
        let family = self.family(segment)?;
        self.txn.get(&family, key, &self.read).map_err(storage_error)
    }

    /// Predecessor lookup over the snapshot and the buffer.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if closed.
    pub fn get_nearest_to(
        &self,
        segment: &SegmentIdentifier,
        key: &[u8],
    ) -> StorageResult<Option<NearestKeyValue>> {
        self.throw_if_closed()?;
        let family = self.family(segment)?;
        let found = self
            .txn
            .seek_for_prev(&family, key, &self.read)
            .map_err(storage_error)?;
        Ok(found.map(|(key, value)| NearestKeyValue { key, value }))
    }

    /// Streams the segment from `start`, or from the first key.
    ///
    /// Buffered writes are captured when the stream is created.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if closed.
    pub fn stream(
        &self,
        segment: &SegmentIdentifier,
        start: Option<&[u8]>,
    ) -> StorageResult<KeyValueStream> {
        self.throw_if_closed()?;
        let family = self.family(segment)?;
        let mode = start.map_or(IteratorMode::Start, IteratorMode::From);
        let iter = self
            .txn
            .iterator(&family, mode, &self.read)
            .map_err(storage_error)?;
        Ok(Box::new(iter))
    }

    /// Creates an independent transaction over the same snapshot, starting
    /// with a copy of this one's buffer.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if closed.
    pub fn copy(&self) -> StorageResult<Self> {
        self.throw_if_closed()?;
        let mut copy = Self::new(
            self.engine.clone(),
            Arc::clone(&self.families),
            Arc::clone(&self.marker),
        )?;
        copy.txn
            .rebuild_from_write_batch(&self.txn.pending_batch())
            .map_err(storage_error)?;
        Ok(copy)
    }

    /// Closes the transaction and releases its snapshot use. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.txn.is_active() {
            let _ = self.txn.rollback();
        }
        self.marker.unmark();
    }
}

impl SegmentedKeyValueStorageTransaction for LsmSnapshotTransaction {
    fn put(&mut self, segment: &SegmentIdentifier, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.throw_if_closed()?;
        let family = self.family(segment)?;
        self.txn.put(&family, key, value).map_err(storage_error)
    }

    fn remove(&mut self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<()> {
        self.throw_if_closed()?;
        let family = self.family(segment)?;
        self.txn.delete(&family, key).map_err(storage_error)
    }

    fn commit(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.throw_if_closed()?;
        let result = self.txn.rollback().map_err(storage_error);
        self.close();
        result
    }
}

impl Drop for LsmSnapshotTransaction {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handle onto a snapshot transaction shared with its storage.
struct SharedSnapshotTransaction(Arc<Mutex<LsmSnapshotTransaction>>);

impl SegmentedKeyValueStorageTransaction for SharedSnapshotTransaction {
    fn put(&mut self, segment: &SegmentIdentifier, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.0.lock().put(segment, key, value)
    }

    fn remove(&mut self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<()> {
        self.0.lock().remove(segment, key)
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.0.lock().commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.0.lock().rollback()
    }
}

/// Segmented storage view of a snapshot.
pub struct LsmColumnarSnapshot {
    txn: Arc<Mutex<LsmSnapshotTransaction>>,
    closed: Arc<AtomicBool>,
}

impl LsmColumnarSnapshot {
    pub(crate) fn take(
        engine: &Engine,
        families: HashMap<SegmentIdentifier, ColumnFamilyHandle>,
    ) -> StorageResult<Self> {
        let snapshot = engine.snapshot().map_err(storage_error)?;
        debug!(sequence = %snapshot.sequence(), "snapshot taken");
        let marker = Arc::new(SnapshotMarker::new(snapshot));
        let txn = LsmSnapshotTransaction::new(engine.clone(), Arc::new(families), marker)?;
        Ok(Self::from_transaction(txn))
    }

    fn from_transaction(txn: LsmSnapshotTransaction) -> Self {
        Self {
            txn: Arc::new(Mutex::new(txn)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marker of the engine snapshot this view reads.
    #[must_use]
    pub fn marker(&self) -> Arc<SnapshotMarker> {
        Arc::clone(self.txn.lock().marker())
    }

    fn throw_if_closed(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            error!("Attempting to use a closed snapshot");
            return Err(StorageError::illegal_state("Storage has been closed"));
        }
        Ok(())
    }

    fn shared_transaction(&self) -> Box<dyn SegmentedKeyValueStorageTransaction> {
        Box::new(ValidatingTransaction::new(
            Box::new(SharedSnapshotTransaction(Arc::clone(&self.txn))),
            Arc::clone(&self.closed),
        ))
    }
}

impl SegmentedKeyValueStorage for LsmColumnarSnapshot {
    fn get(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.throw_if_closed()?;
        self.txn.lock().get(segment, key)
    }

    fn get_nearest_to(
        &self,
        segment: &SegmentIdentifier,
        key: &[u8],
    ) -> StorageResult<Option<NearestKeyValue>> {
        self.throw_if_closed()?;
        self.txn.lock().get_nearest_to(segment, key)
    }

    fn start_transaction(&self) -> StorageResult<Box<dyn SegmentedKeyValueStorageTransaction>> {
        self.throw_if_closed()?;
        Ok(self.shared_transaction())
    }

    fn stream(&self, segment: &SegmentIdentifier) -> StorageResult<KeyValueStream> {
        self.throw_if_closed()?;
        self.txn.lock().stream(segment, None)
    }

    fn stream_from_key(
        &self,
        segment: &SegmentIdentifier,
        start: &[u8],
    ) -> StorageResult<KeyValueStream> {
        self.throw_if_closed()?;
        self.txn.lock().stream(segment, Some(start))
    }

    fn try_delete(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<bool> {
        self.throw_if_closed()?;
        self.txn.lock().remove(segment, key)?;
        Ok(true)
    }

    fn clear(&self, _segment: &SegmentIdentifier) -> StorageResult<()> {
        Err(StorageError::Unsupported {
            operation: "Clearing a snapshot",
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> StorageResult<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.txn.lock().close();
        }
        Ok(())
    }
}

impl SnappedKeyValueStorage for LsmColumnarSnapshot {
    fn snapshot_transaction(&self) -> StorageResult<Box<dyn SegmentedKeyValueStorageTransaction>> {
        self.throw_if_closed()?;
        Ok(self.shared_transaction())
    }

    fn clone_snapshot(&self) -> StorageResult<Box<dyn SnappedKeyValueStorage>> {
        self.throw_if_closed()?;
        let copy = self.txn.lock().copy()?;
        Ok(Box::new(Self::from_transaction(copy)))
    }
}
