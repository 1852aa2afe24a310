//! Read-your-writes transactions.

use crate::batch::{BatchOp, WriteBatch};
use crate::db::EngineInner;
use crate::error::{EngineError, EngineResult};
use crate::family::ColumnFamilyHandle;
use crate::iterator::{DbIterator, IteratorMode, OverlayIterator};
use crate::locks::LockKey;
use crate::options::{ReadOptions, TransactionMode, WriteOptions};
use crate::types::{FamilyId, SequenceNumber};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

/// Transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can accept operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    Aborted,
}

/// A buffered set of writes committed atomically.
///
/// Reads through the transaction see its own pending writes laid over the
/// committed state. Under [`TransactionMode::Optimistic`] a commit fails with
/// `Busy` if another commit touched one of the written keys after the
/// transaction began; under [`TransactionMode::Pessimistic`] each written key
/// is locked as it is written and held until the transaction ends.
pub struct Transaction {
    inner: Arc<EngineInner>,
    owner: u64,
    start: SequenceNumber,
    options: WriteOptions,
    pending: HashMap<FamilyId, BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
    handles: HashMap<FamilyId, ColumnFamilyHandle>,
    held: Vec<LockKey>,
    state: TransactionState,
}

impl Transaction {
    pub(crate) fn new(inner: Arc<EngineInner>, options: WriteOptions) -> Self {
        let owner = inner.next_owner();
        let start = inner.latest();
        Self {
            inner,
            owner,
            start,
            options,
            pending: HashMap::new(),
            handles: HashMap::new(),
            held: Vec::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns `true` while the transaction accepts operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Sequence number observed when the transaction began.
    #[must_use]
    pub fn start_sequence(&self) -> SequenceNumber {
        self.start
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(BTreeMap::len).sum()
    }

    fn ensure_active(&self) -> EngineResult<()> {
        if self.state != TransactionState::Active {
            return Err(EngineError::TransactionClosed);
        }
        self.inner.ensure_open()
    }

    fn lock_key(&mut self, family: &ColumnFamilyHandle, key: &[u8]) -> EngineResult<()> {
        if self.inner.mode() != TransactionMode::Pessimistic {
            return Ok(());
        }
        let lock_key = (family.id(), key.to_vec());
        let wait = (!self.options.no_slowdown).then_some(self.inner.lock_timeout());
        if self.inner.locks.acquire(self.owner, &lock_key, wait)? {
            self.held.push(lock_key);
        }
        Ok(())
    }

    fn buffer(&mut self, family: &ColumnFamilyHandle, key: &[u8], value: Option<Vec<u8>>) {
        self.handles
            .entry(family.id())
            .or_insert_with(|| Arc::clone(family));
        self.pending
            .entry(family.id())
            .or_default()
            .insert(key.to_vec(), value);
    }

    /// Buffers a put.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction has finished, or a lock
    /// error in pessimistic mode.
    pub fn put(&mut self, family: &ColumnFamilyHandle, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.ensure_active()?;
        self.lock_key(family, key)?;
        self.buffer(family, key, Some(value.to_vec()));
        Ok(())
    }

    /// Buffers a delete.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction has finished, or a lock
    /// error in pessimistic mode.
    pub fn delete(&mut self, family: &ColumnFamilyHandle, key: &[u8]) -> EngineResult<()> {
        self.ensure_active()?;
        self.lock_key(family, key)?;
        self.buffer(family, key, None);
        Ok(())
    }

    fn pending_value(&self, family: &ColumnFamilyHandle, key: &[u8]) -> Option<&Option<Vec<u8>>> {
        self.pending.get(&family.id()).and_then(|delta| delta.get(key))
    }

    /// Reads a key, seeing this transaction's own writes first.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction has finished.
    pub fn get(
        &self,
        family: &ColumnFamilyHandle,
        key: &[u8],
        read: &ReadOptions,
    ) -> EngineResult<Option<Vec<u8>>> {
        self.ensure_active()?;
        if let Some(pending) = self.pending_value(family, key) {
            return Ok(pending.clone());
        }
        self.inner.get(family, key, read)
    }

    /// Ascending iterator over committed entries merged with pending writes.
    ///
    /// Pending writes are captured when the iterator is created.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction has finished.
    pub fn iterator(
        &self,
        family: &ColumnFamilyHandle,
        mode: IteratorMode<'_>,
        read: &ReadOptions,
    ) -> EngineResult<OverlayIterator> {
        self.ensure_active()?;
        let base: DbIterator = self.inner.iterator(family, mode, read)?;
        let lower = mode.lower_bound();
        let delta: BTreeMap<Vec<u8>, Option<Vec<u8>>> = self
            .pending
            .get(&family.id())
            .map(|delta| {
                delta
                    .range((lower, Bound::Unbounded))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(OverlayIterator::new(base, delta.into_iter()))
    }

    /// Greatest entry with a key `<= key`, seeing pending writes.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction has finished.
    pub fn seek_for_prev(
        &self,
        family: &ColumnFamilyHandle,
        key: &[u8],
        read: &ReadOptions,
    ) -> EngineResult<Option<(Vec<u8>, Vec<u8>)>> {
        self.ensure_active()?;
        let point = self.inner.read_point(read);
        let delta = self.pending.get(&family.id());

        let mut upper: Bound<Vec<u8>> = Bound::Included(key.to_vec());
        loop {
            let base = family.prev_visible(as_slice_bound(&upper), point);
            let pending = delta.and_then(|delta| {
                delta
                    .range::<Vec<u8>, _>((Bound::Unbounded, upper.clone()))
                    .next_back()
            });

            match (base, pending) {
                (None, None) => return Ok(None),
                (Some((base_key, base_value)), Some((pending_key, _)))
                    if base_key > *pending_key =>
                {
                    return Ok(Some((base_key, base_value)));
                }
                (base, None) => return Ok(base),
                (_, Some((pending_key, Some(value)))) => {
                    return Ok(Some((pending_key.clone(), value.clone())));
                }
                (_, Some((pending_key, None))) => {
                    upper = Bound::Excluded(pending_key.clone());
                }
            }
        }
    }

    /// Snapshot of the pending writes as a batch.
    #[must_use]
    pub fn pending_batch(&self) -> WriteBatch {
        let mut ids: Vec<&FamilyId> = self.pending.keys().collect();
        ids.sort();
        let mut batch = WriteBatch::new();
        for id in ids {
            let (Some(delta), Some(family)) = (self.pending.get(id), self.handles.get(id)) else {
                continue;
            };
            for (key, value) in delta {
                batch.push_op(BatchOp {
                    family: Arc::clone(family),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        batch
    }

    /// Replaces the pending writes with the contents of `batch`.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction has finished, or a lock
    /// error in pessimistic mode.
    pub fn rebuild_from_write_batch(&mut self, batch: &WriteBatch) -> EngineResult<()> {
        self.ensure_active()?;
        self.pending.clear();
        self.handles.clear();
        for op in batch.ops() {
            self.lock_key(&op.family, &op.key)?;
            self.buffer(&op.family, &op.key, op.value.clone());
        }
        Ok(())
    }

    /// Commits every pending write atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The transaction has already finished (`TransactionClosed`)
    /// - A written key changed since the transaction began (`Busy`,
    ///   optimistic mode only)
    /// - `no_slowdown` is set and the commit would wait (`Incomplete`)
    /// - The journal append fails
    ///
    /// A failed commit aborts the transaction.
    pub fn commit(&mut self) -> EngineResult<()> {
        self.ensure_active()?;
        let batch = self.pending_batch();
        let validate = (self.inner.mode() == TransactionMode::Optimistic).then_some(self.start);

        let result = self.inner.commit(&batch, &self.options, validate);
        self.finish(if result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::Aborted
        });
        if let Err(err) = &result {
            debug!(owner = self.owner, error = %err, "transaction commit failed");
        }
        result
    }

    /// Discards every pending write.
    ///
    /// # Errors
    ///
    /// Returns `TransactionClosed` if the transaction has already finished.
    pub fn rollback(&mut self) -> EngineResult<()> {
        if self.state != TransactionState::Active {
            return Err(EngineError::TransactionClosed);
        }
        self.finish(TransactionState::Aborted);
        Ok(())
    }

    fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.pending.clear();
        self.handles.clear();
        let held = std::mem::take(&mut self.held);
        self.inner.locks.release(self.owner, &held);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.held.is_empty() {
            let held = std::mem::take(&mut self.held);
            self.inner.locks.release(self.owner, &held);
        }
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
