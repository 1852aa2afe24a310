//! Storage transactions and the validating decorator.

use crate::error::{StorageError, StorageResult};
use crate::segment::SegmentIdentifier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A buffered group of writes across segments.
///
/// `commit` applies every write or none; `rollback` discards them. Both are
/// terminal.
pub trait SegmentedKeyValueStorageTransaction: Send {
    /// Buffers a put.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has finished or the backend
    /// rejects the write.
    fn put(&mut self, segment: &SegmentIdentifier, key: &[u8], value: &[u8])
        -> StorageResult<()>;

    /// Buffers a removal.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has finished or the backend
    /// rejects the write.
    fn remove(&mut self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<()>;

    /// Applies every buffered write atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has finished or the commit fails.
    fn commit(&mut self) -> StorageResult<()>;

    /// Discards every buffered write.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has finished.
    fn rollback(&mut self) -> StorageResult<()>;
}

/// A transaction bound to a single segment.
pub trait KeyValueStorageTransaction: Send {
    /// Buffers a put.
    ///
    /// # Errors
    ///
    /// See [`SegmentedKeyValueStorageTransaction::put`].
    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Buffers a removal.
    ///
    /// # Errors
    ///
    /// See [`SegmentedKeyValueStorageTransaction::remove`].
    fn remove(&mut self, key: &[u8]) -> StorageResult<()>;

    /// Applies every buffered write atomically.
    ///
    /// # Errors
    ///
    /// See [`SegmentedKeyValueStorageTransaction::commit`].
    fn commit(&mut self) -> StorageResult<()>;

    /// Discards every buffered write.
    ///
    /// # Errors
    ///
    /// See [`SegmentedKeyValueStorageTransaction::rollback`].
    fn rollback(&mut self) -> StorageResult<()>;
}

/// Guards a transaction against use after completion and against use once
/// its storage is closed, whatever the wrapped backend enforces itself.
///
/// Every transaction a storage hands out is wrapped in one of these.
pub struct ValidatingTransaction {
    inner: Box<dyn SegmentedKeyValueStorageTransaction>,
    storage_closed: Arc<AtomicBool>,
    active: bool,
}

impl ValidatingTransaction {
    /// Wraps `inner`; `storage_closed` is the owning storage's closed flag.
    pub fn new(
        inner: Box<dyn SegmentedKeyValueStorageTransaction>,
        storage_closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner,
            storage_closed,
            active: true,
        }
    }

    /// Returns `true` until `commit` or `rollback` is called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn check(&self, completed: &str, closed: &str) -> StorageResult<()> {
        if !self.active {
            return Err(StorageError::illegal_state(completed));
        }
        if self.storage_closed.load(Ordering::Acquire) {
            return Err(StorageError::illegal_state(closed));
        }
        Ok(())
    }
}

impl SegmentedKeyValueStorageTransaction for ValidatingTransaction {
    fn put(
        &mut self,
        segment: &SegmentIdentifier,
        key: &[u8],
        value: &[u8],
    ) -> StorageResult<()> {
        self.check(
            "Cannot invoke put() on a completed transaction.",
            "Cannot invoke put() on a closed storage.",
        )?;
        self.inner.put(segment, key, value)
    }

    fn remove(&mut self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<()> {
        self.check(
            "Cannot invoke remove() on a completed transaction.",
            "Cannot invoke remove() on a closed storage.",
        )?;
        self.inner.remove(segment, key)
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.check(
            "Cannot commit a completed transaction.",
            "Cannot invoke commit() on a closed storage.",
        )?;
        self.active = false;
        self.inner.commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.check(
            "Cannot rollback a completed transaction.",
            "Cannot invoke rollback() on a closed storage.",
        )?;
        self.active = false;
        self.inner.rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const SEGMENT: SegmentIdentifier = SegmentIdentifier::new("TEST", &[7]);

    #[derive(Default)]
    struct Recording {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SegmentedKeyValueStorageTransaction for Recording {
        fn put(&mut self, _: &SegmentIdentifier, _: &[u8], _: &[u8]) -> StorageResult<()> {
            self.calls.lock().push("put");
            Ok(())
        }

        fn remove(&mut self, _: &SegmentIdentifier, _: &[u8]) -> StorageResult<()> {
            self.calls.lock().push("remove");
            Ok(())
        }

        fn commit(&mut self) -> StorageResult<()> {
            self.calls.lock().push("commit");
            Err(StorageError::backend("commit failed"))
        }

        fn rollback(&mut self) -> StorageResult<()> {
            self.calls.lock().push("rollback");
            Ok(())
        }
    }

    fn wrap() -> (ValidatingTransaction, Arc<Mutex<Vec<&'static str>>>, Arc<AtomicBool>) {
        let inner = Recording::default();
        let calls = Arc::clone(&inner.calls);
        let closed = Arc::new(AtomicBool::new(false));
        (
            ValidatingTransaction::new(Box::new(inner), Arc::clone(&closed)),
            calls,
            closed,
        )
    }

    #[test]
    fn completed_transaction_rejects_everything() {
        let (mut txn, calls, _) = wrap();
        txn.put(&SEGMENT, b"k", b"v").unwrap();
        txn.rollback().unwrap();

        let err = txn.commit().unwrap_err();
        assert_eq!(err.to_string(), "Cannot commit a completed transaction.");
        let err = txn.remove(&SEGMENT, b"k").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot invoke remove() on a completed transaction."
        );
        assert_eq!(*calls.lock(), vec!["put", "rollback"]);
    }

    #[test]
    fn failed_commit_still_completes() {
        let (mut txn, _, _) = wrap();
        assert!(txn.commit().is_err());
        assert!(!txn.is_active());
        assert_eq!(
            txn.rollback().unwrap_err().to_string(),
            "Cannot rollback a completed transaction."
        );
    }

    #[test]
    fn closed_storage_rejects_calls() {
        let (mut txn, calls, closed) = wrap();
        closed.store(true, Ordering::Release);

        let err = txn.put(&SEGMENT, b"k", b"v").unwrap_err();
        assert_eq!(err.to_string(), "Cannot invoke put() on a closed storage.");
        assert!(matches!(err, StorageError::IllegalState { .. }));
        assert!(txn.is_active());
        assert!(calls.lock().is_empty());
    }
}
