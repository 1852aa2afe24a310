//! Ordered iterators over a column family.
//!
//! Iterators are lazy: every step re-enters the family's read lock for a
//! single range lookup, so no lock is held between steps and writers are
//! never blocked by a slow consumer.

use crate::family::ColumnFamilyHandle;
use crate::snapshot::Snapshot;
use crate::types::SequenceNumber;
use std::cmp::Ordering;
use std::collections::btree_map;
use std::iter::Peekable;
use std::ops::Bound;

/// Where an iterator starts.
#[derive(Debug, Clone, Copy)]
pub enum IteratorMode<'a> {
    /// From the smallest key.
    Start,
    /// From the first key `>= key`.
    From(&'a [u8]),
}

impl IteratorMode<'_> {
    pub(crate) fn lower_bound(&self) -> Bound<Vec<u8>> {
        match self {
            Self::Start => Bound::Unbounded,
            Self::From(key) => Bound::Included(key.to_vec()),
        }
    }
}

/// Ascending iterator over the entries visible at one sequence number.
pub struct DbIterator {
    family: ColumnFamilyHandle,
    seq: SequenceNumber,
    cursor: Option<Bound<Vec<u8>>>,
    _pin: Option<Snapshot>,
}

impl DbIterator {
    /// `pin` keeps the read sequence registered while the iterator lives.
    pub(crate) fn new(
        family: ColumnFamilyHandle,
        seq: SequenceNumber,
        mode: IteratorMode<'_>,
        pin: Option<Snapshot>,
    ) -> Self {
        Self {
            family,
            seq,
            cursor: Some(mode.lower_bound()),
            _pin: pin,
        }
    }

    /// Returns the sequence number this iterator reads at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.seq
    }
}

impl Iterator for DbIterator {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let lower = self.cursor.take()?;
        let bound = match &lower {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let (key, value) = self.family.next_visible(bound, self.seq)?;
        self.cursor = Some(Bound::Excluded(key.clone()));
        Some((key, value))
    }
}

/// Pending writes of one family, `None` marking a delete.
pub(crate) type Delta = btree_map::IntoIter<Vec<u8>, Option<Vec<u8>>>;

/// A base iterator with a transaction's pending writes laid over it.
///
/// Pending puts shadow or add entries; pending deletes hide them.
pub struct OverlayIterator {
    base: Peekable<DbIterator>,
    delta: Peekable<Delta>,
}

impl OverlayIterator {
    pub(crate) fn new(base: DbIterator, delta: Delta) -> Self {
        Self {
            base: base.peekable(),
            delta: delta.peekable(),
        }
    }
}

impl Iterator for OverlayIterator {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match (self.base.peek(), self.delta.peek()) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((base_key, _)), Some((delta_key, _))) => base_key.cmp(delta_key),
            };

            match step {
                Ordering::Less => return self.base.next(),
                Ordering::Equal => {
                    self.base.next();
                }
                Ordering::Greater => {}
            }

            if let Some((key, Some(value))) = self.delta.next() {
                return Some((key, value));
            }
        }
    }
}
