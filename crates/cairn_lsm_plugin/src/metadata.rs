//! The `DATABASE_METADATA.json` record and database initialization.
//!
//! The metadata file lives in the data path, next to the engine directory,
//! and pins the format and layout version a database was created with.
//! [`initialize`] runs once per factory before the engine is opened.

use crate::format::{BaseVersionedStorageFormat, VersionedStorageFormat};
use cairn_plugin_api::{CommonConfiguration, DataStorageFormat, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the metadata file inside the data path.
pub const METADATA_FILENAME: &str = "DATABASE_METADATA.json";

const METADATA_TEMP: &str = "DATABASE_METADATA.json.tmp";

/// Persisted format and version of a database.
///
/// Any pair decodes, known or not, so an unknown pair can be named in the
/// error that rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    format: DataStorageFormat,
    version: u32,
}

impl DatabaseMetadata {
    /// Creates a record.
    #[must_use]
    pub const fn new(format: DataStorageFormat, version: u32) -> Self {
        Self { format, version }
    }

    /// Record written for a new database under `config`.
    #[must_use]
    pub fn default_for_new_db(config: &CommonConfiguration) -> Self {
        BaseVersionedStorageFormat::default_for_new_db(config.data_storage()).into()
    }

    /// Returns `true` if `data_dir` holds a metadata file.
    #[must_use]
    pub fn is_present(data_dir: &Path) -> bool {
        data_dir.join(METADATA_FILENAME).is_file()
    }

    /// Reads the record stored in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns `MetadataUnreadable` if the file cannot be read or parsed.
    pub fn look_up_from(data_dir: &Path) -> StorageResult<Self> {
        let path = data_dir.join(METADATA_FILENAME);
        let bytes = fs::read(&path)
            .map_err(|err| StorageError::metadata_unreadable(format!("{}: {err}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::metadata_unreadable(format!("{}: {err}", path.display())))
    }

    /// Writes the record into `data_dir`, replacing any previous one
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns `MetadataUnreadable` if the file cannot be written.
    pub fn write_to_directory(&self, data_dir: &Path) -> StorageResult<()> {
        self.write_atomic(data_dir)
            .map_err(|err| StorageError::metadata_unreadable(format!("{}: {err}", data_dir.display())))
    }

    fn write_atomic(&self, data_dir: &Path) -> std::io::Result<()> {
        let temp_path = data_dir.join(METADATA_TEMP);
        let data = serde_json::to_vec(self)?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, data_dir.join(METADATA_FILENAME))?;
        sync_directory(data_dir)
    }

    /// The known pair this record names, if any.
    #[must_use]
    pub fn versioned_format(&self) -> Option<BaseVersionedStorageFormat> {
        BaseVersionedStorageFormat::from_parts(self.format, self.version)
    }
}

impl VersionedStorageFormat for DatabaseMetadata {
    fn format(&self) -> DataStorageFormat {
        self.format
    }

    fn version(&self) -> u32 {
        self.version
    }
}

impl From<BaseVersionedStorageFormat> for DatabaseMetadata {
    fn from(format: BaseVersionedStorageFormat) -> Self {
        Self::new(format.format(), format.version())
    }
}

impl fmt::Display for DatabaseMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseMetadata{{format={}, version={}}}", self.format, self.version)
    }
}

#[cfg(unix)]
fn sync_directory(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Reads or creates the metadata of the database described by `config`.
///
/// # Errors
///
/// Returns an error if:
/// - Engine data exists without a metadata file (`MetadataNotFound`)
/// - The recorded format differs from the configured one (`FormatMismatch`)
/// - The recorded version is newer and not a known compatible downgrade
///   (`UnsafeDowngrade`)
/// - The recorded pair is not supported (`UnsupportedMetadata`)
/// - The file cannot be read or written (`MetadataUnreadable`)
pub fn initialize(config: &CommonConfiguration) -> StorageResult<DatabaseMetadata> {
    let data_path = config.data_path();
    let data_exists = config.storage_path().exists();
    let metadata_exists = DatabaseMetadata::is_present(data_path);

    if data_exists && !metadata_exists {
        return Err(StorageError::MetadataNotFound);
    }

    let runtime = BaseVersionedStorageFormat::default_for_new_db(config.data_storage());
    let metadata = if metadata_exists {
        let metadata = DatabaseMetadata::look_up_from(data_path)?;
        info!("Existing database at {}. Metadata {}", data_path.display(), metadata);
        check_compatibility(data_path, &metadata, runtime)?;
        metadata
    } else {
        let metadata = DatabaseMetadata::from(runtime);
        info!(
            "No existing database at {}. Using default metadata for new db {}",
            data_path.display(),
            metadata
        );
        fs::create_dir_all(data_path).map_err(|err| {
            StorageError::metadata_unreadable(format!("{}: {err}", data_path.display()))
        })?;
        metadata.write_to_directory(data_path)?;
        metadata
    };

    match metadata.versioned_format() {
        Some(known) if known.is_supported() => Ok(metadata),
        _ => Err(StorageError::UnsupportedMetadata {
            metadata: metadata.to_string(),
        }),
    }
}

fn check_compatibility(
    data_path: &Path,
    metadata: &DatabaseMetadata,
    runtime: BaseVersionedStorageFormat,
) -> StorageResult<()> {
    if metadata.format() != runtime.format() {
        return Err(StorageError::FormatMismatch {
            path: PathBuf::from(data_path),
            existing: metadata.format().to_string(),
            expected: runtime.format().to_string(),
        });
    }

    if metadata.version() > runtime.version() {
        if runtime.accepts_downgrade_from(metadata.format(), metadata.version()) {
            warn!(
                "Database at {} is {} with version {}; this runtime writes version {}. \
                 Compacted entries written by the newer version remain readable but no new \
                 entries will be compacted.",
                data_path.display(),
                metadata.format(),
                metadata.version(),
                runtime.version()
            );
        } else {
            return Err(StorageError::UnsafeDowngrade {
                path: PathBuf::from(data_path),
                format: metadata.format().to_string(),
                existing_version: metadata.version(),
                runtime_version: runtime.version(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_plugin_api::DataStorageConfiguration;
    use tempfile::tempdir;

    fn config(data_path: &Path, format: DataStorageFormat) -> CommonConfiguration {
        CommonConfiguration::new(data_path, DataStorageConfiguration { format })
    }

    fn write_raw(dir: &Path, json: &str) {
        fs::write(dir.join(METADATA_FILENAME), json).unwrap();
    }

    #[test]
    fn json_layout() {
        let metadata = DatabaseMetadata::new(DataStorageFormat::Compact, 2);
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"format":"COMPACT","version":2}"#);
    }

    #[test]
    fn write_then_look_up() {
        let dir = tempdir().unwrap();
        assert!(!DatabaseMetadata::is_present(dir.path()));

        let metadata = DatabaseMetadata::new(DataStorageFormat::Archive, 2);
        metadata.write_to_directory(dir.path()).unwrap();
        assert!(DatabaseMetadata::is_present(dir.path()));
        assert!(!dir.path().join(METADATA_TEMP).exists());
        assert_eq!(DatabaseMetadata::look_up_from(dir.path()).unwrap(), metadata);
    }

    #[test]
    fn garbage_is_unreadable() {
        let dir = tempdir().unwrap();
        write_raw(dir.path(), "not json");
        let err = DatabaseMetadata::look_up_from(dir.path()).unwrap_err();
        assert!(matches!(err, StorageError::MetadataUnreadable { .. }));
    }

    #[test]
    fn new_database_gets_default_metadata() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("data");
        let metadata = initialize(&config(&data_path, DataStorageFormat::Compact)).unwrap();

        assert_eq!(metadata, DatabaseMetadata::new(DataStorageFormat::Compact, 2));
        assert_eq!(DatabaseMetadata::look_up_from(&data_path).unwrap(), metadata);
    }

    #[test]
    fn data_without_metadata_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), DataStorageFormat::Compact);
        fs::create_dir_all(config.storage_path()).unwrap();

        let err = initialize(&config).unwrap_err();
        assert!(matches!(err, StorageError::MetadataNotFound));
    }

    #[test]
    fn format_mismatch_names_both_formats() {
        let dir = tempdir().unwrap();
        write_raw(dir.path(), r#"{"format":"ARCHIVE","version":2}"#);

        let err = initialize(&config(dir.path(), DataStorageFormat::Compact)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ARCHIVE"), "{message}");
        assert!(message.contains("COMPACT"), "{message}");
    }

    #[test]
    fn compatible_downgrade_keeps_metadata() {
        let dir = tempdir().unwrap();
        write_raw(dir.path(), r#"{"format":"COMPACT","version":3}"#);

        let metadata = initialize(&config(dir.path(), DataStorageFormat::Compact)).unwrap();
        assert_eq!(metadata.version(), 3);
        assert_eq!(DatabaseMetadata::look_up_from(dir.path()).unwrap().version(), 3);
    }

    #[test]
    fn unknown_newer_version_is_unsafe() {
        let dir = tempdir().unwrap();
        write_raw(dir.path(), r#"{"format":"COMPACT","version":9}"#);

        let err = initialize(&config(dir.path(), DataStorageFormat::Compact)).unwrap_err();
        match err {
            StorageError::UnsafeDowngrade {
                existing_version,
                runtime_version,
                ..
            } => {
                assert_eq!(existing_version, 9);
                assert_eq!(runtime_version, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn original_archive_layout_is_rejected() {
        let dir = tempdir().unwrap();
        write_raw(dir.path(), r#"{"format":"ARCHIVE","version":1}"#);

        let err = initialize(&config(dir.path(), DataStorageFormat::Archive)).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedMetadata { .. }));
        assert!(DatabaseMetadata::is_present(dir.path()));
    }
}
