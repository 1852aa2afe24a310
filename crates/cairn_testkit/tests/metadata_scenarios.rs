//! Database metadata handling on open.

use cairn_core::ALL_SEGMENTS;
use cairn_lsm_plugin::{DatabaseMetadata, METADATA_FILENAME};
use cairn_plugin_api::{DataStorageFormat, KeyValueStorageFactory, StorageError, DATABASE_DIR};
use cairn_testkit::{common_configuration, lsm_factory, write_metadata};
use std::fs;
use tempfile::tempdir;

#[test]
fn fresh_directory_gets_metadata_and_rejects_another_format() {
    let dir = tempdir().unwrap();
    let archive = common_configuration(dir.path(), DataStorageFormat::Archive);
    let storage = lsm_factory(&ALL_SEGMENTS)
        .create(&ALL_SEGMENTS, &archive)
        .unwrap();
    storage.close().unwrap();
    drop(storage);

    let metadata = DatabaseMetadata::look_up_from(dir.path()).unwrap();
    assert_eq!(metadata, DatabaseMetadata::new(DataStorageFormat::Archive, 2));

    let compact = common_configuration(dir.path(), DataStorageFormat::Compact);
    let err = lsm_factory(&ALL_SEGMENTS)
        .create(&ALL_SEGMENTS, &compact)
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::FormatMismatch { .. }));
    let message = err.to_string();
    assert!(message.contains("is ARCHIVE"), "{message}");
    assert!(message.contains("expects COMPACT"), "{message}");
}

#[test]
fn data_without_metadata_is_rejected_for_every_format() {
    for format in DataStorageFormat::ALL {
        let dir = tempdir().unwrap();
        let storage_path = dir.path().join(DATABASE_DIR);
        fs::create_dir_all(&storage_path).unwrap();
        fs::write(storage_path.join("000001.journal"), b"data").unwrap();

        let err = lsm_factory(&ALL_SEGMENTS)
            .create(&ALL_SEGMENTS, &common_configuration(dir.path(), format))
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::MetadataNotFound), "{format}");
        assert!(err.to_string().contains("metadata file not found"));
        assert!(!dir.path().join(METADATA_FILENAME).exists());
    }
}

#[test]
fn compatible_newer_version_opens_and_keeps_metadata() {
    for format in DataStorageFormat::ALL {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), format, 3);
        let before = fs::read(dir.path().join(METADATA_FILENAME)).unwrap();

        let factory = lsm_factory(&ALL_SEGMENTS);
        let storage = factory
            .create(&ALL_SEGMENTS, &common_configuration(dir.path(), format))
            .unwrap();
        assert!(!storage.is_closed());
        assert_eq!(factory.metadata(), Some(DatabaseMetadata::new(format, 3)));

        let after = fs::read(dir.path().join(METADATA_FILENAME)).unwrap();
        assert_eq!(before, after, "{format}");
    }
}

#[test]
fn unknown_newer_version_is_an_unsafe_downgrade() {
    let dir = tempdir().unwrap();
    write_metadata(dir.path(), DataStorageFormat::Compact, 7);

    let err = lsm_factory(&ALL_SEGMENTS)
        .create(
            &ALL_SEGMENTS,
            &common_configuration(dir.path(), DataStorageFormat::Compact),
        )
        .err()
        .unwrap();
    assert!(matches!(
        err,
        StorageError::UnsafeDowngrade {
            existing_version: 7,
            runtime_version: 2,
            ..
        }
    ));
}

#[test]
fn original_archive_layout_is_unsupported() {
    let dir = tempdir().unwrap();
    write_metadata(dir.path(), DataStorageFormat::Archive, 1);

    let err = lsm_factory(&ALL_SEGMENTS)
        .create(
            &ALL_SEGMENTS,
            &common_configuration(dir.path(), DataStorageFormat::Archive),
        )
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::UnsupportedMetadata { .. }));
}
