//! Segmented key-value storage contracts.

use crate::error::StorageResult;
use crate::segment::SegmentIdentifier;
use crate::transaction::{KeyValueStorageTransaction, SegmentedKeyValueStorageTransaction};
use std::collections::HashSet;

/// Lazy, ascending, one-shot sequence of entries.
///
/// Dropping the stream releases its engine resources; dropping it before it
/// is exhausted is fine.
pub type KeyValueStream = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + Send>;

/// Lazy, ascending, one-shot sequence of keys.
pub type KeyStream = Box<dyn Iterator<Item = Vec<u8>> + Send>;

/// Key predicate used by the bulk scans.
pub type KeyPredicate<'a> = &'a dyn Fn(&[u8]) -> bool;

/// Result of a predecessor lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearestKeyValue {
    /// The matched key: equal to the requested key or the greatest key below it.
    pub key: Vec<u8>,
    /// Value stored under `key`.
    pub value: Vec<u8>,
}

/// Ends `stream` after the last key `<= end`.
#[must_use]
pub fn bounded_stream(stream: KeyValueStream, end: &[u8]) -> KeyValueStream {
    let end = end.to_vec();
    Box::new(stream.take_while(move |(key, _)| key.as_slice() <= end.as_slice()))
}

/// Storage split into isolated segments.
///
/// Every operation on a closed instance fails with
/// [`StorageError::IllegalState`](crate::StorageError::IllegalState).
pub trait SegmentedKeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or the backend fails.
    fn get(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Returns `true` if `key` has a value.
    ///
    /// # Errors
    ///
    /// Same as [`SegmentedKeyValueStorage::get`].
    fn contains_key(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(segment, key)?.is_some())
    }

    /// Returns the entry at `key`, or the greatest entry with a smaller key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or the backend fails.
    fn get_nearest_to(
        &self,
        segment: &SegmentIdentifier,
        key: &[u8],
    ) -> StorageResult<Option<NearestKeyValue>>;

    /// Starts a transaction spanning every segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn start_transaction(&self) -> StorageResult<Box<dyn SegmentedKeyValueStorageTransaction>>;

    /// Streams every entry of the segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream(&self, segment: &SegmentIdentifier) -> StorageResult<KeyValueStream>;

    /// Streams entries with keys `>= start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream_from_key(
        &self,
        segment: &SegmentIdentifier,
        start: &[u8],
    ) -> StorageResult<KeyValueStream>;

    /// Streams entries with keys in `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream_from_key_to(
        &self,
        segment: &SegmentIdentifier,
        start: &[u8],
        end: &[u8],
    ) -> StorageResult<KeyValueStream> {
        Ok(bounded_stream(self.stream_from_key(segment, start)?, end))
    }

    /// Streams every key of the segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream_keys(&self, segment: &SegmentIdentifier) -> StorageResult<KeyStream> {
        Ok(Box::new(self.stream(segment)?.map(|(key, _)| key)))
    }

    /// Deletes `key` without waiting.
    ///
    /// Returns `false` if a resource needed for the delete was not
    /// immediately available. Contention is never an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or the backend fails for a
    /// reason other than contention.
    fn try_delete(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<bool>;

    /// Collects every key matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn get_all_keys_that(
        &self,
        segment: &SegmentIdentifier,
        predicate: KeyPredicate<'_>,
    ) -> StorageResult<HashSet<Vec<u8>>> {
        Ok(self
            .stream_keys(segment)?
            .filter(|key| predicate(key))
            .collect())
    }

    /// Collects the values of every key matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn get_all_values_from_keys_that(
        &self,
        segment: &SegmentIdentifier,
        predicate: KeyPredicate<'_>,
    ) -> StorageResult<HashSet<Vec<u8>>> {
        Ok(self
            .stream(segment)?
            .filter(|(key, _)| predicate(key))
            .map(|(_, value)| value)
            .collect())
    }

    /// Replaces the segment with a fresh, empty one.
    ///
    /// Streams opened before the call keep their view.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or the backend fails.
    fn clear(&self, segment: &SegmentIdentifier) -> StorageResult<()>;

    /// Returns `true` once [`SegmentedKeyValueStorage::close`] ran.
    fn is_closed(&self) -> bool;

    /// Releases every resource. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to shut down cleanly.
    fn close(&self) -> StorageResult<()>;

    /// Returns the snapshot capability, if the storage has one.
    fn as_snappable(&self) -> Option<&dyn SnappableKeyValueStorage> {
        None
    }
}

/// Storage able to take point-in-time snapshots.
pub trait SnappableKeyValueStorage: SegmentedKeyValueStorage {
    /// Takes a snapshot of every segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn take_snapshot(&self) -> StorageResult<Box<dyn SnappedKeyValueStorage>>;
}

/// A point-in-time view with its own write buffer.
///
/// Reads see the snapshot plus writes made through the snapshot's
/// transaction. Nothing written here reaches the underlying storage.
pub trait SnappedKeyValueStorage: SegmentedKeyValueStorage {
    /// Returns a transaction over the snapshot's shared write buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is closed.
    fn snapshot_transaction(&self) -> StorageResult<Box<dyn SegmentedKeyValueStorageTransaction>>;

    /// Returns an independent snapshot sharing this one's point in time and
    /// starting with a copy of its buffered writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is closed.
    fn clone_snapshot(&self) -> StorageResult<Box<dyn SnappedKeyValueStorage>>;
}

/// Storage restricted to a single segment.
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or the backend fails.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Returns `true` if `key` has a value.
    ///
    /// # Errors
    ///
    /// Same as [`KeyValueStorage::get`].
    fn contains_key(&self, key: &[u8]) -> StorageResult<bool>;

    /// Predecessor lookup, see [`SegmentedKeyValueStorage::get_nearest_to`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or the backend fails.
    fn get_nearest_to(&self, key: &[u8]) -> StorageResult<Option<NearestKeyValue>>;

    /// Streams every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream(&self) -> StorageResult<KeyValueStream>;

    /// Streams entries with keys `>= start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream_from_key(&self, start: &[u8]) -> StorageResult<KeyValueStream>;

    /// Streams entries with keys in `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream_from_key_to(&self, start: &[u8], end: &[u8]) -> StorageResult<KeyValueStream>;

    /// Streams every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn stream_keys(&self) -> StorageResult<KeyStream>;

    /// Non-blocking delete; `false` on contention.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn try_delete(&self, key: &[u8]) -> StorageResult<bool>;

    /// Collects every key matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn get_all_keys_that(&self, predicate: KeyPredicate<'_>) -> StorageResult<HashSet<Vec<u8>>>;

    /// Collects the values of every key matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn get_all_values_from_keys_that(
        &self,
        predicate: KeyPredicate<'_>,
    ) -> StorageResult<HashSet<Vec<u8>>>;

    /// Replaces the segment with a fresh, empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed or the backend fails.
    fn clear(&self) -> StorageResult<()>;

    /// Starts a transaction on this segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is closed.
    fn start_transaction(&self) -> StorageResult<Box<dyn KeyValueStorageTransaction>>;

    /// Returns `true` once the underlying storage is closed.
    fn is_closed(&self) -> bool;

    /// Closes the underlying storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to shut down cleanly.
    fn close(&self) -> StorageResult<()>;
}
