//! Storage factories.

use crate::adapter::SegmentedKeyValueStorageAdapter;
use crate::config::CommonConfiguration;
use crate::error::StorageResult;
use crate::segment::SegmentIdentifier;
use crate::storage::{KeyValueStorage, SegmentedKeyValueStorage};
use std::sync::Arc;

/// Builds segmented storage instances. Registered with the host's
/// [`StorageService`](crate::StorageService) under [`Self::name`].
pub trait KeyValueStorageFactory: Send + Sync {
    /// Name the host configuration selects the factory by.
    fn name(&self) -> &str;

    /// Creates, or returns the already created, storage for `segments`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database metadata is incompatible, a segment
    /// is not configured, or the backend cannot be opened.
    fn create(
        &self,
        segments: &[SegmentIdentifier],
        config: &CommonConfiguration,
    ) -> StorageResult<Arc<dyn SegmentedKeyValueStorage>>;

    /// Creates storage for a single segment.
    ///
    /// # Errors
    ///
    /// Same as [`KeyValueStorageFactory::create`].
    fn create_single(
        &self,
        segment: &SegmentIdentifier,
        config: &CommonConfiguration,
    ) -> StorageResult<Box<dyn KeyValueStorage>> {
        let storage = self.create(std::slice::from_ref(segment), config)?;
        Ok(Box::new(SegmentedKeyValueStorageAdapter::new(*segment, storage)))
    }

    /// Whether segments are physically isolated from each other.
    fn is_segment_isolation_supported(&self) -> bool;

    /// Releases factory resources.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    fn close(&self) -> StorageResult<()>;
}
