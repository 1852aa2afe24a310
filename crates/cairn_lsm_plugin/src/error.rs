//! Engine to storage error mapping.

use cairn_engine::EngineError;
use cairn_plugin_api::{display_segment, SegmentIdentifier, StorageError};
use tracing::error;

const DISK_FULL_MESSAGE: &str = "No space left on device";
const CLOSED_MESSAGE: &str = "Storage has been closed";

/// Maps an engine error, naming families through `known` segments.
pub(crate) fn map_engine_error(err: EngineError, known: &[SegmentIdentifier]) -> StorageError {
    let message = err.to_string();
    if message.contains(DISK_FULL_MESSAGE) {
        error!(error = %message, "storage ran out of disk space");
        return StorageError::DiskFull { message };
    }

    match err {
        EngineError::ColumnFamiliesNotOpened { names } => {
            let segments = names
                .iter()
                .map(|name| describe_family(name, known))
                .collect::<Vec<_>>()
                .join(", ");
            StorageError::UnhandledColumnFamilies { segments }
        }
        EngineError::Closed => StorageError::illegal_state(CLOSED_MESSAGE),
        _ => StorageError::Backend { message },
    }
}

/// Maps an engine error outside of open.
pub(crate) fn storage_error(err: EngineError) -> StorageError {
    map_engine_error(err, &[])
}

fn describe_family(name: &[u8], known: &[SegmentIdentifier]) -> String {
    known
        .iter()
        .find(|segment| segment.id() == name)
        .map_or_else(
            || display_segment(&String::from_utf8_lossy(name), name),
            SegmentIdentifier::for_display,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const MARKET: SegmentIdentifier = SegmentIdentifier::new("MARKET_DATA", &[1]);

    #[test]
    fn disk_full_is_distinguished() {
        let err = EngineError::Io(io::Error::new(
            io::ErrorKind::Other,
            "No space left on device (os error 28)",
        ));
        let mapped = storage_error(err);
        assert!(mapped.is_disk_full());
    }

    #[test]
    fn unopened_families_use_known_names() {
        let err = EngineError::ColumnFamiliesNotOpened {
            names: vec![vec![1], b"stray".to_vec()],
        };
        let mapped = map_engine_error(err, &[MARKET]);
        assert_eq!(
            mapped.to_string(),
            "Unhandled column families: ['MARKET_DATA'(0x01), 'stray'(0x7374726179)]"
        );
    }

    #[test]
    fn closed_engine_is_an_illegal_state() {
        let mapped = storage_error(EngineError::Closed);
        assert!(matches!(mapped, StorageError::IllegalState { .. }));
        assert_eq!(mapped.to_string(), "Storage has been closed");
    }

    #[test]
    fn other_errors_keep_message() {
        let mapped = storage_error(EngineError::Incomplete);
        assert!(matches!(mapped, StorageError::Backend { .. }));
        assert_eq!(mapped.to_string(), EngineError::Incomplete.to_string());
    }
}
