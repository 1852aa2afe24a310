//! Data storage formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical layout family of a database.
///
/// The format picks which segments are active and which engine variant
/// backs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataStorageFormat {
    /// Full history with pessimistic key locking.
    Archive,
    /// Compacted layout with optimistic transactions and snapshots.
    Compact,
}

impl DataStorageFormat {
    /// Every format, in declaration order.
    pub const ALL: [Self; 2] = [Self::Archive, Self::Compact];

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Archive => "ARCHIVE",
            Self::Compact => "COMPACT",
        }
    }
}

impl fmt::Display for DataStorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown format name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data storage format '{0}', expected one of ARCHIVE, COMPACT")]
pub struct ParseFormatError(pub String);

impl FromStr for DataStorageFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseFormatError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("compact".parse(), Ok(DataStorageFormat::Compact));
        assert_eq!("ARCHIVE".parse(), Ok(DataStorageFormat::Archive));
        assert!("forest".parse::<DataStorageFormat>().is_err());
    }

    #[test]
    fn serializes_upper_case() {
        let json = serde_json::to_string(&DataStorageFormat::Compact).unwrap();
        assert_eq!(json, "\"COMPACT\"");
        let back: DataStorageFormat = serde_json::from_str("\"ARCHIVE\"").unwrap();
        assert_eq!(back, DataStorageFormat::Archive);
    }
}
