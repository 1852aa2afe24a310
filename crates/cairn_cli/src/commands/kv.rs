//! Single-segment key-value commands.

use cairn_core::{CoreResult, StorageProvider};
use cairn_plugin_api::{KeyValueStorage, KeyValueStream, SegmentIdentifier};
use serde::Serialize;
use std::io::Write;

/// One printed entry.
#[derive(Debug, Serialize)]
pub struct Entry {
    /// Key, lossily decoded as UTF-8.
    pub key: String,
    /// Value, lossily decoded as UTF-8.
    pub value: String,
}

impl Entry {
    fn new(key: &[u8], value: &[u8]) -> Self {
        Self {
            key: String::from_utf8_lossy(key).into_owned(),
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

/// Bounds of a scan.
#[derive(Debug, Default)]
pub struct ScanRange {
    /// First key to include.
    pub from: Option<Vec<u8>>,
    /// Last key to include; only honored together with `from`.
    pub to: Option<Vec<u8>>,
    /// Maximum number of entries.
    pub limit: Option<usize>,
}

/// Runs the put command.
pub fn put<P: StorageProvider>(
    provider: &P,
    segment: &SegmentIdentifier,
    key: &[u8],
    value: &[u8],
) -> CoreResult<()> {
    let storage = provider.storage_by_segment(segment)?;
    let mut txn = storage.start_transaction()?;
    txn.put(key, value)?;
    txn.commit()?;
    Ok(())
}

/// Runs the get command.
pub fn get<W: Write, P: StorageProvider>(
    out: &mut W,
    provider: &P,
    segment: &SegmentIdentifier,
    key: &[u8],
) -> CoreResult<()> {
    let storage = provider.storage_by_segment(segment)?;
    match storage.get(key)? {
        Some(value) => writeln!(out, "{}", String::from_utf8_lossy(&value))?,
        None => writeln!(out, "Key not found")?,
    }
    Ok(())
}

/// Runs the delete command.
pub fn delete<W: Write, P: StorageProvider>(
    out: &mut W,
    provider: &P,
    segment: &SegmentIdentifier,
    key: &[u8],
) -> CoreResult<()> {
    let storage = provider.storage_by_segment(segment)?;
    let mut txn = storage.start_transaction()?;
    txn.remove(key)?;
    txn.commit()?;
    writeln!(out, "Deleted {}", String::from_utf8_lossy(key))?;
    Ok(())
}

/// Runs the scan command.
pub fn scan<W: Write, P: StorageProvider>(
    out: &mut W,
    provider: &P,
    segment: &SegmentIdentifier,
    range: &ScanRange,
    format: &str,
) -> CoreResult<()> {
    let storage = provider.storage_by_segment(segment)?;
    let stream: KeyValueStream = match (&range.from, &range.to) {
        (Some(from), Some(to)) => storage.stream_from_key_to(from, to)?,
        (Some(from), None) => storage.stream_from_key(from)?,
        _ => storage.stream()?,
    };
    let entries: Vec<Entry> = stream
        .take(range.limit.unwrap_or(usize::MAX))
        .map(|(key, value)| Entry::new(&key, &value))
        .collect();

    if format == "json" {
        serde_json::to_writer_pretty(&mut *out, &entries).map_err(std::io::Error::from)?;
        writeln!(out)?;
    } else {
        for entry in &entries {
            writeln!(out, "{}={}", entry.key, entry.value)?;
        }
        writeln!(out, "{} entries", entries.len())?;
    }
    Ok(())
}

/// Runs the nearest command.
pub fn nearest<W: Write, P: StorageProvider>(
    out: &mut W,
    provider: &P,
    segment: &SegmentIdentifier,
    key: &[u8],
) -> CoreResult<()> {
    let storage = provider.storage_by_segment(segment)?;
    match storage.get_nearest_to(key)? {
        Some(found) => {
            let entry = Entry::new(&found.key, &found.value);
            writeln!(out, "{}={}", entry.key, entry.value)?;
        }
        None => writeln!(out, "No key at or below {}", String::from_utf8_lossy(key))?,
    }
    Ok(())
}

/// Runs the clear command.
pub fn clear<W: Write, P: StorageProvider>(
    out: &mut W,
    provider: &P,
    segment: &SegmentIdentifier,
) -> CoreResult<()> {
    provider.storage_by_segment(segment)?.clear()?;
    writeln!(out, "Cleared segment {}", segment.name())?;
    Ok(())
}
