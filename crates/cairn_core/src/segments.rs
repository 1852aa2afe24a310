//! The host's segment set.

use cairn_plugin_api::SegmentIdentifier;

/// Catch-all segment, mapped onto the engine's `default` family.
pub const DEFAULT: SegmentIdentifier = SegmentIdentifier::new("DEFAULT", b"default");

/// Market data.
pub const MARKET_DATA: SegmentIdentifier = SegmentIdentifier::new("MARKET_DATA", &[1])
    .with_static_data(false)
    .with_high_spec_cache();

/// Trade blotter.
pub const BLOTTER: SegmentIdentifier = SegmentIdentifier::new("BLOTTER", &[2])
    .with_static_data(false)
    .with_high_spec_cache();

/// Every segment, in declaration order.
pub const ALL_SEGMENTS: [SegmentIdentifier; 3] = [DEFAULT, MARKET_DATA, BLOTTER];

/// Looks a segment up by name, ignoring case.
#[must_use]
pub fn by_name(name: &str) -> Option<SegmentIdentifier> {
    ALL_SEGMENTS
        .into_iter()
        .find(|segment| segment.name().eq_ignore_ascii_case(name))
}
