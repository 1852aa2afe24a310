//! In-memory column family with multi-version keys.

use crate::options::ColumnFamilyOptions;
use crate::types::{FamilyId, SequenceNumber};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared handle to an open column family.
///
/// A handle stays readable after its family is dropped: iterators created
/// before the drop keep draining the old contents.
pub type ColumnFamilyHandle = Arc<ColumnFamily>;

/// Sequence a read observes.
///
/// `Latest` is resolved while the family lock is held, so a concurrent prune
/// can never remove a version the read is about to look at.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ReadPoint<'a> {
    At(SequenceNumber),
    Latest(&'a AtomicU64),
}

impl ReadPoint<'_> {
    fn resolve(self) -> SequenceNumber {
        match self {
            Self::At(seq) => seq,
            Self::Latest(last) => SequenceNumber::new(last.load(Ordering::Acquire)),
        }
    }
}

/// Versions of one key, ascending by sequence. `None` is a tombstone.
#[derive(Debug, Clone, Default)]
pub(crate) struct VersionChain {
    versions: Vec<(SequenceNumber, Option<Vec<u8>>)>,
}

impl VersionChain {
    fn visible(&self, seq: SequenceNumber) -> Option<&Option<Vec<u8>>> {
        self.versions
            .iter()
            .rev()
            .find(|(version, _)| *version <= seq)
            .map(|(_, value)| value)
    }

    fn value_at(&self, seq: SequenceNumber) -> Option<&[u8]> {
        self.visible(seq).and_then(|value| value.as_deref())
    }

    fn latest_sequence(&self) -> Option<SequenceNumber> {
        self.versions.last().map(|(seq, _)| *seq)
    }

    fn push(&mut self, seq: SequenceNumber, value: Option<Vec<u8>>) {
        match self.versions.last_mut() {
            Some(last) if last.0 == seq => last.1 = value,
            _ => self.versions.push((seq, value)),
        }
    }

    /// Keeps every version newer than `horizon` plus the newest one at or
    /// below it. Returns `true` when nothing visible remains.
    fn prune(&mut self, horizon: SequenceNumber) -> bool {
        if let Some(pos) = self.versions.iter().rposition(|(seq, _)| *seq <= horizon) {
            self.versions.drain(..pos);
        }
        matches!(self.versions.as_slice(), [(seq, None)] if *seq <= horizon)
    }
}

/// A named, isolated key space.
#[derive(Debug)]
pub struct ColumnFamily {
    id: FamilyId,
    name: Vec<u8>,
    options: ColumnFamilyOptions,
    dropped: AtomicBool,
    data: RwLock<BTreeMap<Vec<u8>, VersionChain>>,
}

impl ColumnFamily {
    pub(crate) fn new(id: FamilyId, name: Vec<u8>, options: ColumnFamilyOptions) -> Self {
        Self {
            id,
            name,
            options,
            dropped: AtomicBool::new(false),
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the family id.
    #[must_use]
    pub fn id(&self) -> FamilyId {
        self.id
    }

    /// Returns the raw family name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the family options.
    #[must_use]
    pub fn options(&self) -> &ColumnFamilyOptions {
        &self.options
    }

    /// Returns `true` once the family has been dropped or replaced by a
    /// reset.
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::Release);
    }

    /// An empty family with the same id, name and options.
    pub(crate) fn emptied(&self) -> Self {
        Self::new(self.id, self.name.clone(), self.options.clone())
    }

    pub(crate) fn get_at(&self, key: &[u8], point: ReadPoint<'_>) -> Option<Vec<u8>> {
        let data = self.data.read();
        let seq = point.resolve();
        data.get(key)
            .and_then(|chain| chain.value_at(seq))
            .map(<[u8]>::to_vec)
    }

    pub(crate) fn latest_sequence_of(&self, key: &[u8]) -> Option<SequenceNumber> {
        self.data.read().get(key).and_then(VersionChain::latest_sequence)
    }

    pub(crate) fn apply(&self, seq: SequenceNumber, key: &[u8], value: Option<Vec<u8>>) {
        let mut data = self.data.write();
        match data.get_mut(key) {
            Some(chain) => chain.push(seq, value),
            None => {
                let mut chain = VersionChain::default();
                chain.push(seq, value);
                data.insert(key.to_vec(), chain);
            }
        }
    }

    /// First visible entry with a key inside `lower`.., at `seq`.
    pub(crate) fn next_visible(
        &self,
        lower: Bound<&[u8]>,
        seq: SequenceNumber,
    ) -> Option<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        data.range::<[u8], _>((lower, Bound::Unbounded))
            .find_map(|(key, chain)| chain.value_at(seq).map(|v| (key.clone(), v.to_vec())))
    }

    /// Greatest visible entry with a key inside ..`upper`.
    pub(crate) fn prev_visible(
        &self,
        upper: Bound<&[u8]>,
        point: ReadPoint<'_>,
    ) -> Option<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        let seq = point.resolve();
        data.range::<[u8], _>((Bound::Unbounded, upper))
            .rev()
            .find_map(|(key, chain)| chain.value_at(seq).map(|v| (key.clone(), v.to_vec())))
    }

    /// Every visible entry at `seq`, in key order.
    pub(crate) fn entries_at(&self, seq: SequenceNumber) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .filter_map(|(key, chain)| chain.value_at(seq).map(|v| (key.clone(), v.to_vec())))
            .collect()
    }

    /// Drops versions no live reader can observe.
    pub(crate) fn prune(&self, horizon: SequenceNumber) -> usize {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, chain| !chain.prune(horizon));
        before - data.len()
    }

    /// Number of keys with at least one version.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> ColumnFamily {
        ColumnFamily::new(FamilyId::new(1), b"test".to_vec(), ColumnFamilyOptions::default())
    }

    fn seq(n: u64) -> SequenceNumber {
        SequenceNumber::new(n)
    }

    fn at(n: u64) -> ReadPoint<'static> {
        ReadPoint::At(seq(n))
    }

    #[test]
    fn reads_see_versions_at_or_below_sequence() {
        let cf = family();
        cf.apply(seq(1), b"k", Some(b"one".to_vec()));
        cf.apply(seq(3), b"k", Some(b"three".to_vec()));
        cf.apply(seq(5), b"k", None);

        assert_eq!(cf.get_at(b"k", at(0)), None);
        assert_eq!(cf.get_at(b"k", at(2)).as_deref(), Some(&b"one"[..]));
        assert_eq!(cf.get_at(b"k", at(4)).as_deref(), Some(&b"three"[..]));
        assert_eq!(cf.get_at(b"k", at(5)), None);
    }

    #[test]
    fn latest_point_resolves_under_lock() {
        let cf = family();
        let last = AtomicU64::new(1);
        cf.apply(seq(1), b"k", Some(b"one".to_vec()));
        cf.apply(seq(2), b"k", Some(b"unpublished".to_vec()));
        assert_eq!(
            cf.get_at(b"k", ReadPoint::Latest(&last)).as_deref(),
            Some(&b"one"[..])
        );
        last.store(2, Ordering::Release);
        assert_eq!(
            cf.get_at(b"k", ReadPoint::Latest(&last)).as_deref(),
            Some(&b"unpublished"[..])
        );
    }

    #[test]
    fn same_sequence_overwrites() {
        let cf = family();
        cf.apply(seq(2), b"k", Some(b"a".to_vec()));
        cf.apply(seq(2), b"k", Some(b"b".to_vec()));
        assert_eq!(cf.get_at(b"k", at(2)).as_deref(), Some(&b"b"[..]));
    }

    #[test]
    fn prev_visible_skips_tombstones() {
        let cf = family();
        cf.apply(seq(1), &[2], Some(vec![2]));
        cf.apply(seq(1), &[5], Some(vec![5]));
        cf.apply(seq(2), &[5], None);

        assert_eq!(cf.prev_visible(Bound::Included(&[7u8][..]), at(2)), Some((vec![2], vec![2])));
        assert_eq!(cf.prev_visible(Bound::Included(&[7u8][..]), at(1)), Some((vec![5], vec![5])));
        assert_eq!(cf.prev_visible(Bound::Included(&[1u8][..]), at(2)), None);
    }

    #[test]
    fn prune_keeps_horizon_version() {
        let cf = family();
        cf.apply(seq(1), b"a", Some(b"1".to_vec()));
        cf.apply(seq(2), b"a", Some(b"2".to_vec()));
        cf.apply(seq(3), b"a", Some(b"3".to_vec()));
        cf.apply(seq(1), b"gone", Some(b"x".to_vec()));
        cf.apply(seq(2), b"gone", None);

        let removed = cf.prune(seq(2));
        assert_eq!(removed, 1);
        assert_eq!(cf.get_at(b"a", at(2)).as_deref(), Some(&b"2"[..]));
        assert_eq!(cf.get_at(b"a", at(3)).as_deref(), Some(&b"3"[..]));
        assert_eq!(cf.key_count(), 1);
    }
}
