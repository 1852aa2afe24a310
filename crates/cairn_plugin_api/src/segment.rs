//! Segment identifiers.

use crate::format::DataStorageFormat;
use std::fmt::{self, Write as _};

/// Names an isolated key space inside a segmented storage.
///
/// Identifiers are compile-time values: the host declares its full set as
/// constants and plugins receive them by reference. The `id` is the physical
/// namespace key and must be unique within a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentIdentifier {
    name: &'static str,
    id: &'static [u8],
    formats: &'static [DataStorageFormat],
    contains_static_data: bool,
    eligible_for_high_spec_cache: bool,
    static_data_gc_enabled: bool,
}

impl SegmentIdentifier {
    /// Creates an identifier included in every format, with all flags off.
    #[must_use]
    pub const fn new(name: &'static str, id: &'static [u8]) -> Self {
        Self {
            name,
            id,
            formats: &DataStorageFormat::ALL,
            contains_static_data: false,
            eligible_for_high_spec_cache: false,
            static_data_gc_enabled: false,
        }
    }

    /// Restricts the formats this segment is part of.
    #[must_use]
    pub const fn with_formats(mut self, formats: &'static [DataStorageFormat]) -> Self {
        self.formats = formats;
        self
    }

    /// Marks the segment as holding static data, optionally garbage
    /// collected.
    #[must_use]
    pub const fn with_static_data(mut self, garbage_collected: bool) -> Self {
        self.contains_static_data = true;
        self.static_data_gc_enabled = garbage_collected;
        self
    }

    /// Marks the segment as eligible for the high-spec cache tier.
    #[must_use]
    pub const fn with_high_spec_cache(mut self) -> Self {
        self.eligible_for_high_spec_cache = true;
        self
    }

    /// Stable, unique name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Physical namespace key.
    #[must_use]
    pub const fn id(&self) -> &'static [u8] {
        self.id
    }

    /// Whether the segment holds static data.
    #[must_use]
    pub const fn contains_static_data(&self) -> bool {
        self.contains_static_data
    }

    /// Whether the segment may use the high-spec cache tier.
    #[must_use]
    pub const fn is_eligible_for_high_spec_cache(&self) -> bool {
        self.eligible_for_high_spec_cache
    }

    /// Whether static data in this segment is garbage collected.
    #[must_use]
    pub const fn is_static_data_gc_enabled(&self) -> bool {
        self.static_data_gc_enabled
    }

    /// Whether a database of `format` contains this segment.
    #[must_use]
    pub fn include_in_database_format(&self, format: DataStorageFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Renders the identifier as `'NAME'(0xHEX)`.
    #[must_use]
    pub fn for_display(&self) -> String {
        display_segment(self.name, self.id)
    }
}

impl fmt::Display for SegmentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Renders a name and raw id as `'NAME'(0xHEX)`.
#[must_use]
pub fn display_segment(name: &str, id: &[u8]) -> String {
    let mut out = format!("'{name}'(0x");
    for byte in id {
        let _ = write!(out, "{byte:02x}");
    }
    out.push(')');
    out
}
