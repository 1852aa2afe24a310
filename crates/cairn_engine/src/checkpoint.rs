//! Full-image checkpoints.
//!
//! ```text
//! | magic "CCKP" | version u16 | sequence u64 | family count u32 |
//! |   family id u32 | entry count u64 | (key, value)* |  ... repeated
//! | crc32 |
//! ```

use crate::codec::{compute_crc32, put_bytes, split_checked, ByteReader};
use crate::error::{EngineError, EngineResult};
use crate::types::{FamilyId, SequenceNumber};

/// Magic bytes for the checkpoint file.
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"CCKP";

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u16 = 1;

/// Latest values of every live family as of one sequence number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointImage {
    /// Journal records at or below this sequence are already included.
    pub sequence: SequenceNumber,
    /// Entries per family, each in key order.
    pub families: Vec<(FamilyId, Vec<(Vec<u8>, Vec<u8>)>)>,
}

impl CheckpointImage {
    /// Encodes the image.
    ///
    /// # Errors
    ///
    /// Returns an error if a key or value exceeds 4 GiB.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CHECKPOINT_MAGIC);
        buf.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        let count = u32::try_from(self.families.len())
            .map_err(|_| EngineError::invalid_argument("too many families"))?;
        buf.extend_from_slice(&count.to_le_bytes());

        for (family, entries) in &self.families {
            buf.extend_from_slice(&family.as_u32().to_le_bytes());
            buf.extend_from_slice(&(entries.len() as u64).to_le_bytes());
            for (key, value) in entries {
                put_bytes(&mut buf, key)?;
                put_bytes(&mut buf, value)?;
            }
        }

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes an image.
    ///
    /// # Errors
    ///
    /// Returns an error on bad magic, unsupported version, checksum
    /// mismatch or truncation.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        let body = split_checked(data, "checkpoint")?;
        let mut reader = ByteReader::new(body, "checkpoint");

        if reader.take(4)? != CHECKPOINT_MAGIC {
            return Err(EngineError::corruption("invalid checkpoint magic"));
        }
        let version = reader.u16()?;
        if version > CHECKPOINT_VERSION {
            return Err(EngineError::corruption(format!(
                "unsupported checkpoint version: {version}"
            )));
        }
        let sequence = SequenceNumber::new(reader.u64()?);
        let family_count = reader.u32()? as usize;

        let mut families = Vec::with_capacity(family_count.min(1024));
        for _ in 0..family_count {
            let family = FamilyId::new(reader.u32()?);
            let entry_count = reader.u64()?;
            let mut entries = Vec::new();
            for _ in 0..entry_count {
                let key = reader.bytes()?;
                let value = reader.bytes()?;
                entries.push((key, value));
            }
            families.push((family, entries));
        }
        reader.expect_end()?;

        Ok(Self { sequence, families })
    }
}
