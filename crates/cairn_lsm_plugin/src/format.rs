//! Versioned storage formats.

use cairn_plugin_api::{DataStorageConfiguration, DataStorageFormat};
use std::fmt;

/// A storage format paired with the on-disk layout version.
pub trait VersionedStorageFormat {
    /// Storage format.
    fn format(&self) -> DataStorageFormat;

    /// Layout version.
    fn version(&self) -> u32;
}

/// The format and version pairs this runtime knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseVersionedStorageFormat {
    /// First archive layout.
    ArchiveOriginal,
    /// Archive layout with a variables segment.
    ArchiveWithVariables,
    /// Compact layout with a variables segment.
    CompactWithVariables,
    /// Archive layout with compacted entries.
    ArchiveWithCompactedEntries,
    /// Compact layout with compacted entries.
    CompactWithCompactedEntries,
}

impl BaseVersionedStorageFormat {
    /// Every known pair.
    pub const ALL: [Self; 5] = [
        Self::ArchiveOriginal,
        Self::ArchiveWithVariables,
        Self::CompactWithVariables,
        Self::ArchiveWithCompactedEntries,
        Self::CompactWithCompactedEntries,
    ];

    /// Pairs this runtime can open.
    pub const SUPPORTED: [Self; 4] = [
        Self::ArchiveWithVariables,
        Self::CompactWithVariables,
        Self::ArchiveWithCompactedEntries,
        Self::CompactWithCompactedEntries,
    ];

    /// Pair written for a new database.
    #[must_use]
    pub const fn default_for_new_db(config: &DataStorageConfiguration) -> Self {
        match config.format {
            DataStorageFormat::Archive => Self::ArchiveWithVariables,
            DataStorageFormat::Compact => Self::CompactWithVariables,
        }
    }

    /// Looks up the known pair for `format` and `version`.
    #[must_use]
    pub fn from_parts(format: DataStorageFormat, version: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|known| known.format() == format && known.version() == version)
    }

    /// Whether this runtime can open databases of this pair.
    #[must_use]
    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    /// Whether a database recorded as `format` at `version` may be opened by a
    /// runtime writing `self`.
    ///
    /// Only the compacted-entries layouts downgrade, and only to the
    /// variables layout of the same format.
    #[must_use]
    pub fn accepts_downgrade_from(self, format: DataStorageFormat, version: u32) -> bool {
        matches!(
            (format, version, self),
            (DataStorageFormat::Archive, 3, Self::ArchiveWithVariables)
                | (DataStorageFormat::Compact, 3, Self::CompactWithVariables)
        )
    }
}

impl VersionedStorageFormat for BaseVersionedStorageFormat {
    fn format(&self) -> DataStorageFormat {
        match self {
            Self::ArchiveOriginal | Self::ArchiveWithVariables | Self::ArchiveWithCompactedEntries => {
                DataStorageFormat::Archive
            }
            Self::CompactWithVariables | Self::CompactWithCompactedEntries => {
                DataStorageFormat::Compact
            }
        }
    }

    fn version(&self) -> u32 {
        match self {
            Self::ArchiveOriginal => 1,
            Self::ArchiveWithVariables | Self::CompactWithVariables => 2,
            Self::ArchiveWithCompactedEntries | Self::CompactWithCompactedEntries => 3,
        }
    }
}

impl fmt::Display for BaseVersionedStorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.format(), self.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_databases_use_variables_layout() {
        let archive = DataStorageConfiguration {
            format: DataStorageFormat::Archive,
        };
        let compact = DataStorageConfiguration::default();
        assert_eq!(
            BaseVersionedStorageFormat::default_for_new_db(&archive),
            BaseVersionedStorageFormat::ArchiveWithVariables
        );
        assert_eq!(
            BaseVersionedStorageFormat::default_for_new_db(&compact),
            BaseVersionedStorageFormat::CompactWithVariables
        );
        assert_eq!(
            BaseVersionedStorageFormat::default_for_new_db(&compact).version(),
            2
        );
    }

    #[test]
    fn original_archive_layout_is_unsupported() {
        let compacted = BaseVersionedStorageFormat::from_parts(DataStorageFormat::Compact, 3);
        assert_eq!(
            compacted,
            Some(BaseVersionedStorageFormat::CompactWithCompactedEntries)
        );
        assert!(BaseVersionedStorageFormat::CompactWithCompactedEntries.is_supported());
        assert!(!BaseVersionedStorageFormat::ArchiveOriginal.is_supported());
        assert_eq!(
            BaseVersionedStorageFormat::from_parts(DataStorageFormat::Compact, 1),
            None
        );
    }

    #[test]
    fn downgrade_only_within_format() {
        let runtime = BaseVersionedStorageFormat::CompactWithVariables;
        assert!(runtime.accepts_downgrade_from(DataStorageFormat::Compact, 3));
        assert!(!runtime.accepts_downgrade_from(DataStorageFormat::Archive, 3));
        assert!(!runtime.accepts_downgrade_from(DataStorageFormat::Compact, 4));
        assert!(BaseVersionedStorageFormat::ArchiveWithVariables
            .accepts_downgrade_from(DataStorageFormat::Archive, 3));
    }
}
