//! Single-segment view over a segmented storage.

use crate::error::{StorageError, StorageResult};
use crate::segment::SegmentIdentifier;
use crate::storage::{
    KeyPredicate, KeyStream, KeyValueStorage, KeyValueStream, NearestKeyValue,
    SegmentedKeyValueStorage,
};
use crate::transaction::{KeyValueStorageTransaction, SegmentedKeyValueStorageTransaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::error;

/// Exposes one segment of a [`SegmentedKeyValueStorage`] as a
/// [`KeyValueStorage`].
#[derive(Clone)]
pub struct SegmentedKeyValueStorageAdapter {
    segment: SegmentIdentifier,
    storage: Arc<dyn SegmentedKeyValueStorage>,
}

impl SegmentedKeyValueStorageAdapter {
    /// Wraps `segment` of `storage`.
    pub fn new(segment: SegmentIdentifier, storage: Arc<dyn SegmentedKeyValueStorage>) -> Self {
        Self { segment, storage }
    }

    /// The wrapped segment.
    #[must_use]
    pub fn segment(&self) -> &SegmentIdentifier {
        &self.segment
    }

    /// The underlying segmented storage.
    #[must_use]
    pub fn segmented_storage(&self) -> &Arc<dyn SegmentedKeyValueStorage> {
        &self.storage
    }

    fn throw_if_closed(&self) -> StorageResult<()> {
        if self.storage.is_closed() {
            error!(segment = %self.segment, "attempting to use a closed storage instance");
            return Err(StorageError::illegal_state("Storage has been closed"));
        }
        Ok(())
    }
}

impl KeyValueStorage for SegmentedKeyValueStorageAdapter {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.throw_if_closed()?;
        self.storage.get(&self.segment, key)
    }

    fn contains_key(&self, key: &[u8]) -> StorageResult<bool> {
        self.throw_if_closed()?;
        self.storage.contains_key(&self.segment, key)
    }

    fn get_nearest_to(&self, key: &[u8]) -> StorageResult<Option<NearestKeyValue>> {
        self.throw_if_closed()?;
        self.storage.get_nearest_to(&self.segment, key)
    }

    fn stream(&self) -> StorageResult<KeyValueStream> {
        self.throw_if_closed()?;
        self.storage.stream(&self.segment)
    }

    fn stream_from_key(&self, start: &[u8]) -> StorageResult<KeyValueStream> {
        self.throw_if_closed()?;
        self.storage.stream_from_key(&self.segment, start)
    }

    fn stream_from_key_to(&self, start: &[u8], end: &[u8]) -> StorageResult<KeyValueStream> {
        self.throw_if_closed()?;
        self.storage.stream_from_key_to(&self.segment, start, end)
    }

    fn stream_keys(&self) -> StorageResult<KeyStream> {
        self.throw_if_closed()?;
        self.storage.stream_keys(&self.segment)
    }

    fn try_delete(&self, key: &[u8]) -> StorageResult<bool> {
        self.throw_if_closed()?;
        self.storage.try_delete(&self.segment, key)
    }

    fn get_all_keys_that(&self, predicate: KeyPredicate<'_>) -> StorageResult<HashSet<Vec<u8>>> {
        self.throw_if_closed()?;
        self.storage.get_all_keys_that(&self.segment, predicate)
    }

    fn get_all_values_from_keys_that(
        &self,
        predicate: KeyPredicate<'_>,
    ) -> StorageResult<HashSet<Vec<u8>>> {
        self.throw_if_closed()?;
        self.storage
            .get_all_values_from_keys_that(&self.segment, predicate)
    }

    fn clear(&self) -> StorageResult<()> {
        self.throw_if_closed()?;
        self.storage.clear(&self.segment)
    }

    fn start_transaction(&self) -> StorageResult<Box<dyn KeyValueStorageTransaction>> {
        self.throw_if_closed()?;
        Ok(Box::new(KeyValueStorageTransactionAdapter::new(
            self.segment,
            self.storage.start_transaction()?,
        )))
    }

    fn is_closed(&self) -> bool {
        self.storage.is_closed()
    }

    fn close(&self) -> StorageResult<()> {
        self.storage.close()
    }
}

/// Binds a segmented transaction to one segment.
pub struct KeyValueStorageTransactionAdapter {
    segment: SegmentIdentifier,
    inner: Box<dyn SegmentedKeyValueStorageTransaction>,
}

impl KeyValueStorageTransactionAdapter {
    /// Wraps `inner`, writing to `segment`.
    pub fn new(
        segment: SegmentIdentifier,
        inner: Box<dyn SegmentedKeyValueStorageTransaction>,
    ) -> Self {
        Self { segment, inner }
    }
}

impl KeyValueStorageTransaction for KeyValueStorageTransactionAdapter {
    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.inner.put(&self.segment, key, value)
    }

    fn remove(&mut self, key: &[u8]) -> StorageResult<()> {
        self.inner.remove(&self.segment, key)
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.inner.rollback()
    }
}
