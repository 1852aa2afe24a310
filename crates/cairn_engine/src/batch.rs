//! Atomic groups of writes.

use crate::family::ColumnFamilyHandle;
use crate::locks::LockKey;
use std::fmt;
use std::sync::Arc;

/// A single buffered write. `value == None` is a delete.
#[derive(Clone)]
pub(crate) struct BatchOp {
    pub(crate) family: ColumnFamilyHandle,
    pub(crate) key: Vec<u8>,
    pub(crate) value: Option<Vec<u8>>,
}

/// Writes applied together or not at all.
#[derive(Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a put.
    pub fn put(&mut self, family: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp {
            family: Arc::clone(family),
            key: key.to_vec(),
            value: Some(value.to_vec()),
        });
    }

    /// Adds a delete.
    pub fn delete(&mut self, family: &ColumnFamilyHandle, key: &[u8]) {
        self.ops.push(BatchOp {
            family: Arc::clone(family),
            key: key.to_vec(),
            value: None,
        });
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Discards every buffered write.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub(crate) fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub(crate) fn push_op(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    pub(crate) fn lock_keys(&self) -> Vec<LockKey> {
        self.ops
            .iter()
            .map(|op| (op.family.id(), op.key.clone()))
            .collect()
    }
}

impl fmt::Debug for WriteBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBatch")
            .field("ops", &self.ops.len())
            .finish()
    }
}
