//! Benchmark utilities for Cairn.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use cairn_plugin_api::{SegmentIdentifier, SegmentedKeyValueStorage};
use rand::Rng;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Big-endian key for `index`, so numeric order matches key order.
pub fn ordered_key(index: u64) -> Vec<u8> {
    index.to_be_bytes().to_vec()
}

/// Generate `count` entries with ordered keys and random payloads.
pub fn generate_entries(count: u64, payload_size: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| (ordered_key(i), random_data(payload_size)))
        .collect()
}

/// Writes `entries` into `segment`, `batch` entries per transaction.
pub fn populate<S>(
    storage: &S,
    segment: &SegmentIdentifier,
    entries: &[(Vec<u8>, Vec<u8>)],
    batch: usize,
) where
    S: SegmentedKeyValueStorage + ?Sized,
{
    for chunk in entries.chunks(batch.max(1)) {
        let mut txn = storage.start_transaction().expect("Failed to start transaction");
        for (key, value) in chunk {
            txn.put(segment, key, value).expect("Failed to put");
        }
        txn.commit().expect("Failed to commit");
    }
}
