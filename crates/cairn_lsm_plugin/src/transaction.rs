//! Storage transactions over engine transactions.

use crate::columnar::SegmentHandles;
use crate::error::storage_error;
use cairn_engine::Transaction;
use cairn_plugin_api::{
    SegmentIdentifier, SegmentedKeyValueStorageTransaction, StorageError, StorageResult,
};
use std::sync::Arc;

/// An engine transaction addressed by segment.
///
/// `commit` and `rollback` consume the engine transaction.
pub struct LsmTransaction {
    txn: Option<Transaction>,
    handles: Arc<SegmentHandles>,
}

impl LsmTransaction {
    pub(crate) fn new(txn: Transaction, handles: Arc<SegmentHandles>) -> Self {
        Self {
            txn: Some(txn),
            handles,
        }
    }

    fn active(&mut self) -> StorageResult<&mut Transaction> {
        self.txn
            .as_mut()
            .ok_or_else(|| StorageError::illegal_state("Transaction has already completed"))
    }

    fn take(&mut self) -> StorageResult<Transaction> {
        self.txn
            .take()
            .ok_or_else(|| StorageError::illegal_state("Transaction has already completed"))
    }
}

impl SegmentedKeyValueStorageTransaction for LsmTransaction {
    fn put(&mut self, segment: &SegmentIdentifier, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let family = self.handles.get(segment)?;
        self.active()?
            .put(&family, key, value)
            .map_err(storage_error)
    }

    fn remove(&mut self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<()> {
        let family = self.handles.get(segment)?;
        self.active()?.delete(&family, key).map_err(storage_error)
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.take()?.commit().map_err(storage_error)
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.take()?.rollback().map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::LsmColumnarKeyValueStorage;
    use crate::config::{LsmConfiguration, LsmFactoryConfiguration};
    use cairn_plugin_api::{DataStorageFormat, SegmentedKeyValueStorage};
    use tempfile::tempdir;

    const ONE: SegmentIdentifier = SegmentIdentifier::new("ONE", &[1]);
    const TWO: SegmentIdentifier = SegmentIdentifier::new("TWO", &[2]);

    fn storage(dir: &std::path::Path, format: DataStorageFormat) -> LsmColumnarKeyValueStorage {
        LsmColumnarKeyValueStorage::open(
            LsmConfiguration::new(dir, LsmFactoryConfiguration::default()),
            format,
            &[ONE, TWO],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn commit_is_atomic_across_segments() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), DataStorageFormat::Compact);

        let mut txn = storage.start_transaction().unwrap();
        txn.put(&ONE, b"a", b"1").unwrap();
        txn.put(&TWO, b"b", b"2").unwrap();
        assert_eq!(storage.get(&ONE, b"a").unwrap(), None);
        txn.commit().unwrap();

        assert_eq!(storage.get(&ONE, b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(storage.get(&TWO, b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn rollback_discards_writes() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), DataStorageFormat::Archive);

        let mut txn = storage.start_transaction().unwrap();
        txn.put(&ONE, b"a", b"1").unwrap();
        txn.remove(&TWO, b"b").unwrap();
        txn.rollback().unwrap();

        assert_eq!(storage.get(&ONE, b"a").unwrap(), None);
        assert_eq!(
            txn.commit().unwrap_err().to_string(),
            "Cannot commit a completed transaction."
        );
    }

    #[test]
    fn optimistic_conflict_fails_commit() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), DataStorageFormat::Compact);

        let mut first = storage.start_transaction().unwrap();
        let mut second = storage.start_transaction().unwrap();
        first.put(&ONE, b"k", b"first").unwrap();
        second.put(&ONE, b"k", b"second").unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, StorageError::Backend { .. }));
        assert_eq!(storage.get(&ONE, b"k").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn engine_transaction_is_consumed() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path(), DataStorageFormat::Compact);
        let txn = storage.engine().begin_transaction(Default::default()).unwrap();
        let mut txn = LsmTransaction::new(txn, Arc::new(SegmentHandles::default()));

        txn.rollback().unwrap();
        assert!(matches!(
            txn.commit().unwrap_err(),
            StorageError::IllegalState { .. }
        ));
    }
}
