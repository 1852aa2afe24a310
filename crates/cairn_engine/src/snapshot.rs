//! Point-in-time read markers.

use crate::types::SequenceNumber;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registry of live snapshots. The oldest live sequence bounds version
/// pruning.
#[derive(Debug, Default)]
pub(crate) struct SnapshotList {
    live: Mutex<BTreeMap<SequenceNumber, usize>>,
}

impl SnapshotList {
    #[cfg(test)]
    pub(crate) fn acquire(self: &Arc<Self>, seq: SequenceNumber) -> Snapshot {
        *self.live.lock().entry(seq).or_insert(0) += 1;
        Snapshot {
            seq,
            list: Arc::clone(self),
        }
    }

    /// Registers the latest published sequence. The sequence is read under
    /// the list lock so a concurrent [`Self::horizon`] cannot miss it.
    pub(crate) fn acquire_latest(self: &Arc<Self>, last: &AtomicU64) -> Snapshot {
        let mut live = self.live.lock();
        let seq = SequenceNumber::new(last.load(Ordering::Acquire));
        *live.entry(seq).or_insert(0) += 1;
        Snapshot {
            seq,
            list: Arc::clone(self),
        }
    }

    /// Oldest sequence any live reader may observe, given the latest
    /// published one.
    pub(crate) fn horizon(&self, latest: SequenceNumber) -> SequenceNumber {
        self.live
            .lock()
            .keys()
            .next()
            .map_or(latest, |oldest| (*oldest).min(latest))
    }

    fn release(&self, seq: SequenceNumber) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                live.remove(&seq);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn oldest(&self) -> Option<SequenceNumber> {
        self.live.lock().keys().next().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().values().sum()
    }
}

/// A registered point-in-time view.
///
/// Versions visible at this snapshot are kept until it is dropped; dropping
/// it releases the marker back to the engine.
#[derive(Debug)]
pub struct Snapshot {
    seq: SequenceNumber,
    list: Arc<SnapshotList>,
}

impl Snapshot {
    /// Returns the sequence number this snapshot reads at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.seq
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.list.release(self.seq);
    }
}
