//! Model-checked storage harness.
//!
//! Applies operation sequences to a real storage and to an in-memory model
//! of committed state, then compares the two.

use crate::generators::StorageOperation;
use cairn_plugin_api::{
    SegmentIdentifier, SegmentedKeyValueStorage, SegmentedKeyValueStorageTransaction,
};
use std::collections::{BTreeMap, HashMap};

type Model = HashMap<SegmentIdentifier, BTreeMap<Vec<u8>, Vec<u8>>>;

/// Tracks the committed state a storage is expected to hold.
pub struct ModelHarness<'a> {
    storage: &'a dyn SegmentedKeyValueStorage,
    txn: Option<Box<dyn SegmentedKeyValueStorageTransaction>>,
    committed: Model,
    pending: Vec<StorageOperation>,
}

impl<'a> ModelHarness<'a> {
    /// Creates a harness over `storage`, which must start empty.
    pub fn new(storage: &'a dyn SegmentedKeyValueStorage) -> Self {
        Self {
            storage,
            txn: None,
            committed: Model::new(),
            pending: Vec::new(),
        }
    }

    fn txn(&mut self) -> &mut Box<dyn SegmentedKeyValueStorageTransaction> {
        let storage = self.storage;
        self.txn.get_or_insert_with(|| {
            storage
                .start_transaction()
                .expect("Failed to start transaction")
        })
    }

    /// Applies one operation.
    pub fn apply(&mut self, operation: &StorageOperation) {
        match operation {
            StorageOperation::Put {
                segment,
                key,
                value,
            } => {
                self.txn().put(segment, key, value).expect("Failed to put");
                self.pending.push(operation.clone());
            }
            StorageOperation::Remove { segment, key } => {
                self.txn().remove(segment, key).expect("Failed to remove");
                self.pending.push(operation.clone());
            }
            StorageOperation::Commit => {
                if let Some(mut txn) = self.txn.take() {
                    txn.commit().expect("Failed to commit");
                }
                for pending in self.pending.drain(..) {
                    match pending {
                        StorageOperation::Put {
                            segment,
                            key,
                            value,
                        } => {
                            self.committed.entry(segment).or_default().insert(key, value);
                        }
                        StorageOperation::Remove { segment, key } => {
                            self.committed.entry(segment).or_default().remove(&key);
                        }
                        StorageOperation::Commit | StorageOperation::Rollback => {}
                    }
                }
            }
            StorageOperation::Rollback => {
                if let Some(mut txn) = self.txn.take() {
                    txn.rollback().expect("Failed to roll back");
                }
                self.pending.clear();
            }
        }
    }

    /// Applies every operation, then rolls back whatever is left pending.
    pub fn apply_all(&mut self, operations: &[StorageOperation]) {
        for operation in operations {
            self.apply(operation);
        }
        self.apply(&StorageOperation::Rollback);
    }

    /// Asserts that `segments` hold exactly the committed model.
    pub fn verify(&self, segments: &[SegmentIdentifier]) {
        for segment in segments {
            let expected: Vec<(Vec<u8>, Vec<u8>)> = self
                .committed
                .get(segment)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default();
            let actual: Vec<(Vec<u8>, Vec<u8>)> = self
                .storage
                .stream(segment)
                .expect("Failed to stream")
                .collect();
            assert_eq!(actual, expected, "segment {segment} diverged from the model");

            for (key, value) in &expected {
                assert_eq!(
                    self.storage.get(segment, key).expect("Failed to get"),
                    Some(value.clone()),
                    "point lookup diverged in segment {segment}"
                );
            }
        }
    }

    /// Number of committed entries across all segments.
    pub fn committed_count(&self) -> usize {
        self.committed.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStorage;
    use cairn_core::{ALL_SEGMENTS, BLOTTER};

    #[test]
    fn rolled_back_writes_are_not_tracked() {
        let storage = TestStorage::compact();
        let mut harness = ModelHarness::new(&*storage);
        harness.apply_all(&[
            StorageOperation::Put {
                segment: BLOTTER,
                key: b"a".to_vec(),
                value: b"1".to_vec(),
            },
            StorageOperation::Commit,
            StorageOperation::Put {
                segment: BLOTTER,
                key: b"b".to_vec(),
                value: b"2".to_vec(),
            },
            StorageOperation::Rollback,
            StorageOperation::Remove {
                segment: BLOTTER,
                key: b"a".to_vec(),
            },
        ]);
        assert_eq!(harness.committed_count(), 1);
        harness.verify(&ALL_SEGMENTS);
    }
}
