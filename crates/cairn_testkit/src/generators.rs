//! Property-based test generators using proptest.

use cairn_core::ALL_SEGMENTS;
use cairn_plugin_api::SegmentIdentifier;
use proptest::prelude::*;

/// Strategy for generating keys. Short keys collide often, which exercises
/// overwrites and deletes of existing entries.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..8)
}

/// Strategy for generating values, empty ones included.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy picking one of the host segments.
pub fn segment_strategy() -> impl Strategy<Value = SegmentIdentifier> {
    prop::sample::select(ALL_SEGMENTS.to_vec())
}

/// Strategy for a set of distinct sorted keys.
pub fn sorted_keys_strategy(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::btree_set(key_strategy(), 1..max.max(2))
        .prop_map(|keys| keys.into_iter().collect())
}

/// A storage operation.
#[derive(Debug, Clone)]
pub enum StorageOperation {
    /// Put a value.
    Put {
        /// Segment.
        segment: SegmentIdentifier,
        /// Key.
        key: Vec<u8>,
        /// Value.
        value: Vec<u8>,
    },
    /// Remove a key.
    Remove {
        /// Segment.
        segment: SegmentIdentifier,
        /// Key.
        key: Vec<u8>,
    },
    /// Commit the pending writes.
    Commit,
    /// Roll the pending writes back.
    Rollback,
}

/// Strategy for generating storage operations.
pub fn storage_operation_strategy() -> impl Strategy<Value = StorageOperation> {
    prop_oneof![
        6 => (segment_strategy(), key_strategy(), value_strategy())
            .prop_map(|(segment, key, value)| StorageOperation::Put { segment, key, value }),
        2 => (segment_strategy(), key_strategy())
            .prop_map(|(segment, key)| StorageOperation::Remove { segment, key }),
        2 => Just(StorageOperation::Commit),
        1 => Just(StorageOperation::Rollback),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StorageOperation>> {
    prop::collection::vec(storage_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 500,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests. Every case opens a database,
    /// so the counts stay low.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 16,
            max_shrink_iters: 50,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 512,
            max_shrink_iters: 5000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_are_never_empty(key in key_strategy()) {
            prop_assert!(!key.is_empty());
        }

        #[test]
        fn sorted_keys_are_strictly_ascending(keys in sorted_keys_strategy(16)) {
            prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        }

        #[test]
        fn segments_come_from_the_host_set(segment in segment_strategy()) {
            prop_assert!(ALL_SEGMENTS.contains(&segment));
        }
    }
}
