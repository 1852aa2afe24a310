//! Info command implementation.

use cairn_core::{CoreResult, StorageProvider, ALL_SEGMENTS};
use cairn_lsm_plugin::{DatabaseMetadata, VersionedStorageFormat};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Database information.
#[derive(Debug, Serialize)]
pub struct InfoResult {
    /// Data path.
    pub data_path: String,
    /// Storage format recorded in the metadata file.
    pub format: Option<String>,
    /// Format version recorded in the metadata file.
    pub version: Option<u32>,
    /// Plugin summary lines.
    pub plugins: Vec<String>,
    /// Per-segment statistics.
    pub segments: Vec<SegmentInfo>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Segment name.
    pub name: String,
    /// Segment id, hex encoded.
    pub id: String,
    /// Number of keys.
    pub keys: usize,
}

/// Runs the info command.
pub fn run<W: Write, P: StorageProvider>(
    out: &mut W,
    provider: &P,
    data_path: &Path,
    plugins: &[String],
    format: &str,
) -> CoreResult<()> {
    let storage = provider.storage_by_segments(&ALL_SEGMENTS)?;
    let mut segments = Vec::with_capacity(ALL_SEGMENTS.len());
    for segment in &ALL_SEGMENTS {
        segments.push(SegmentInfo {
            name: segment.name().to_string(),
            id: segment.id().iter().map(|b| format!("{b:02x}")).collect(),
            keys: storage.stream_keys(segment)?.count(),
        });
    }

    // The metadata file exists once the storage has been opened
    let metadata = DatabaseMetadata::look_up_from(data_path).ok();
    let result = InfoResult {
        data_path: data_path.display().to_string(),
        format: metadata.map(|m| m.format().to_string()),
        version: metadata.map(|m| m.version()),
        plugins: plugins.to_vec(),
        segments,
    };

    if format == "json" {
        serde_json::to_writer_pretty(&mut *out, &result).map_err(std::io::Error::from)?;
        writeln!(out)?;
    } else {
        print_text(out, &result)?;
    }
    Ok(())
}

fn print_text<W: Write>(out: &mut W, result: &InfoResult) -> std::io::Result<()> {
    writeln!(out, "Database: {}", result.data_path)?;
    match (&result.format, result.version) {
        (Some(format), Some(version)) => writeln!(out, "Format:   {format} v{version}")?,
        _ => writeln!(out, "Format:   unknown")?,
    }
    writeln!(out)?;
    for line in &result.plugins {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    writeln!(out, "Segments:")?;
    for segment in &result.segments {
        writeln!(
            out,
            "  {:<12} id={:<16} keys={}",
            segment.name, segment.id, segment.keys
        )?;
    }
    Ok(())
}
