//! Segmented storage over the engine's column families.
//!
//! Each segment maps to one column family named by the segment id. The
//! storage format picks the engine variant: `ARCHIVE` databases lock keys
//! pessimistically, `COMPACT` databases validate optimistically and can take
//! snapshots.

use crate::config::LsmConfiguration;
use crate::error::{map_engine_error, storage_error};
use crate::snapshot::LsmColumnarSnapshot;
use crate::transaction::LsmTransaction;
use cairn_engine::{
    ColumnFamilyDescriptor, ColumnFamilyHandle, Engine, EngineError, IteratorMode, ReadOptions,
    WriteOptions,
};
use cairn_plugin_api::{
    DataStorageFormat, KeyValueStream, NearestKeyValue, SegmentIdentifier,
    SegmentedKeyValueStorage, SegmentedKeyValueStorageTransaction, SnappableKeyValueStorage,
    SnappedKeyValueStorage, StorageError, StorageResult, ValidatingTransaction,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Which segments an open touches, decided before the engine is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Segments whose families are opened, created if missing.
    pub open: Vec<SegmentIdentifier>,
    /// Ignorable segments skipped because they do not exist on disk.
    pub ignored_absent: Vec<SegmentIdentifier>,
}

impl SegmentPlan {
    /// Reconciles the `required` segments with the families already on disk.
    ///
    /// Segments listed in `ignorable` are only opened if `existing` already
    /// holds their family; every other required segment is opened and
    /// created when missing.
    #[must_use]
    pub fn reconcile(
        required: &[SegmentIdentifier],
        ignorable: &[SegmentIdentifier],
        existing: &[Vec<u8>],
    ) -> Self {
        let mut plan = Self::default();
        for segment in required {
            let on_disk = existing.iter().any(|name| name.as_slice() == segment.id());
            if ignorable.contains(segment) && !on_disk {
                plan.ignored_absent.push(*segment);
            } else {
                plan.open.push(*segment);
            }
        }
        plan
    }
}

/// Live family handle of every open segment.
///
/// `clear` swaps a handle under the write lock; transactions and reads look
/// handles up here on every call so they always reach the current family.
#[derive(Default)]
pub(crate) struct SegmentHandles {
    map: RwLock<HashMap<SegmentIdentifier, ColumnFamilyHandle>>,
}

impl SegmentHandles {
    pub(crate) fn get(&self, segment: &SegmentIdentifier) -> StorageResult<ColumnFamilyHandle> {
        self.map.read().get(segment).cloned().ok_or_else(|| {
            StorageError::illegal_state(format!(
                "Segment {} is not open in this storage",
                segment.for_display()
            ))
        })
    }

    /// Copy of the current handles, unaffected by later `clear` calls.
    pub(crate) fn frozen(&self) -> HashMap<SegmentIdentifier, ColumnFamilyHandle> {
        self.map.read().clone()
    }

    fn segments(&self) -> Vec<SegmentIdentifier> {
        self.map.read().keys().copied().collect()
    }
}

/// Segmented storage backed by one engine instance.
pub struct LsmColumnarKeyValueStorage {
    engine: Engine,
    format: DataStorageFormat,
    handles: Arc<SegmentHandles>,
    closed: Arc<AtomicBool>,
}

impl LsmColumnarKeyValueStorage {
    /// Opens the engine for `segments`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database holds families of unknown segments
    ///   (`UnhandledColumnFamilies`)
    /// - The disk is full (`DiskFull`)
    /// - The engine fails to open for any other reason (`Backend`)
    pub fn open(
        configuration: LsmConfiguration,
        format: DataStorageFormat,
        segments: &[SegmentIdentifier],
        ignorable: &[SegmentIdentifier],
    ) -> StorageResult<Self> {
        let known: Vec<SegmentIdentifier> = segments.iter().chain(ignorable).copied().collect();
        let existing = Engine::list_column_families(configuration.database_dir())
            .map_err(|err| map_engine_error(err, &known))?;
        let plan = SegmentPlan::reconcile(segments, ignorable, &existing);
        debug!(
            open = ?plan.open.iter().map(SegmentIdentifier::name).collect::<Vec<_>>(),
            ignored = ?plan.ignored_absent.iter().map(SegmentIdentifier::name).collect::<Vec<_>>(),
            "segment plan"
        );

        let descriptors: Vec<ColumnFamilyDescriptor> = plan
            .open
            .iter()
            .map(|segment| {
                ColumnFamilyDescriptor::new(segment.id(), configuration.family_options(segment))
            })
            .collect();

        let (engine, families) = Engine::open(
            configuration.database_dir(),
            configuration.engine_options(format),
            &descriptors,
        )
        .map_err(|err| map_engine_error(err, &known))?;

        let handles = SegmentHandles::default();
        handles
            .map
            .write()
            .extend(plan.open.iter().copied().zip(families));

        info!(
            path = %configuration.database_dir().display(),
            format = %format,
            segments = plan.open.len(),
            "storage opened"
        );
        Ok(Self {
            engine,
            format,
            handles: Arc::new(handles),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Format the storage was opened with.
    #[must_use]
    pub fn format(&self) -> DataStorageFormat {
        self.format
    }

    /// Underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Segments currently open.
    #[must_use]
    pub fn segments(&self) -> Vec<SegmentIdentifier> {
        self.handles.segments()
    }

    fn throw_if_closed(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            error!("Attempting to use a closed storage");
            return Err(StorageError::illegal_state("Storage has been closed"));
        }
        Ok(())
    }

    fn iterate(
        &self,
        segment: &SegmentIdentifier,
        mode: IteratorMode<'_>,
    ) -> StorageResult<KeyValueStream> {
        self.throw_if_closed()?;
        let family = self.handles.get(segment)?;
        let iter = self
            .engine
            .iterator(&family, mode, &ReadOptions::default())
            .map_err(storage_error)?;
        Ok(Box::new(iter))
    }

}

impl SegmentedKeyValueStorage for LsmColumnarKeyValueStorage {
    fn get(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.throw_if_closed()?;
        let family = self.handles.get(segment)?;
        self.engine
            .get(&family, key, &ReadOptions::default())
            .map_err(storage_error)
    }

    fn get_nearest_to(
        &self,
        segment: &SegmentIdentifier,
        key: &[u8],
    ) -> StorageResult<Option<NearestKeyValue>> {
        self.throw_if_closed()?;
        let family = self.handles.get(segment)?;
        let found = self
            .engine
            .seek_for_prev(&family, key, &ReadOptions::default())
            .map_err(storage_error)?;
        Ok(found.map(|(key, value)| NearestKeyValue { key, value }))
    }

    fn start_transaction(&self) -> StorageResult<Box<dyn SegmentedKeyValueStorageTransaction>> {
        self.throw_if_closed()?;
        let txn = self
            .engine
            .begin_transaction(WriteOptions::default())
            .map_err(storage_error)?;
        let txn = LsmTransaction::new(txn, Arc::clone(&self.handles));
        Ok(Box::new(ValidatingTransaction::new(
            Box::new(txn),
            Arc::clone(&self.closed),
        )))
    }

    fn stream(&self, segment: &SegmentIdentifier) -> StorageResult<KeyValueStream> {
        self.iterate(segment, IteratorMode::Start)
    }

    fn stream_from_key(
        &self,
        segment: &SegmentIdentifier,
        start: &[u8],
    ) -> StorageResult<KeyValueStream> {
        self.iterate(segment, IteratorMode::From(start))
    }

    fn try_delete(&self, segment: &SegmentIdentifier, key: &[u8]) -> StorageResult<bool> {
        self.throw_if_closed()?;
        let family = self.handles.get(segment)?;
        let options = WriteOptions::new()
            .no_slowdown(true)
            .ignore_missing_column_families(true);
        match self.engine.delete(&family, key, &options) {
            Ok(()) => Ok(true),
            Err(EngineError::Incomplete) => Ok(false),
            Err(err) => Err(storage_error(err)),
        }
    }

    fn clear(&self, segment: &SegmentIdentifier) -> StorageResult<()> {
        self.throw_if_closed()?;
        let mut handles = self.handles.map.write();
        let Some(old) = handles.get(segment).cloned() else {
            return Ok(());
        };

        let fresh = self
            .engine
            .reset_column_family(&old)
            .map_err(storage_error)?;
        handles.insert(*segment, fresh);
        debug!(segment = %segment, "segment cleared");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> StorageResult<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.engine.close().map_err(storage_error)
    }

    fn as_snappable(&self) -> Option<&dyn SnappableKeyValueStorage> {
        match self.format {
            DataStorageFormat::Compact => Some(self),
            DataStorageFormat::Archive => None,
        }
    }
}

impl SnappableKeyValueStorage for LsmColumnarKeyValueStorage {
    fn take_snapshot(&self) -> StorageResult<Box<dyn SnappedKeyValueStorage>> {
        self.throw_if_closed()?;
        if self.format != DataStorageFormat::Compact {
            return Err(StorageError::Unsupported {
                operation: "Snapshots of ARCHIVE storage",
            });
        }
        let snapshot = LsmColumnarSnapshot::take(&self.engine, self.handles.frozen())?;
        Ok(Box::new(snapshot))
    }
}

impl Drop for LsmColumnarKeyValueStorage {
    fn drop(&mut self) {
        if let Err(err) = SegmentedKeyValueStorage::close(self) {
            error!(error = %err, "failed to close storage");
        }
    }
}
