//! Write-ahead journal of committed batches.
//!
//! Every record is wrapped in an envelope:
//!
//! ```text
//! | magic "CJNL" (4) | version (2) | type (1) | len (4) | payload (len) | crc32 (4) |
//! ```
//!
//! The CRC covers everything before it. A record cut short at the end of the
//! file is an interrupted append and is discarded at recovery; a bad magic or
//! checksum anywhere else is corruption.

use crate::backend::LogBackend;
use crate::codec::{compute_crc32, put_bytes, ByteReader};
use crate::error::{EngineError, EngineResult};
use crate::types::{FamilyId, SequenceNumber};
use tracing::warn;

/// Magic bytes identifying a journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"CJNL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
const HEADER_SIZE: usize = 11;

const CRC_SIZE: usize = 4;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// Type of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// An atomically committed write batch.
    Batch = 1,
    /// A column family emptied in place.
    Reset = 2,
}

impl RecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            2 => Some(Self::Reset),
            _ => None,
        }
    }
}

/// One write inside a committed batch. `value == None` is a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Target family.
    pub family: FamilyId,
    /// Key.
    pub key: Vec<u8>,
    /// New value, or `None` for a delete.
    pub value: Option<Vec<u8>>,
}

/// A journaled change, tagged with the sequence it was published at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// Writes applied atomically, in application order.
    Batch {
        /// Sequence number the batch was committed at.
        sequence: SequenceNumber,
        /// Writes in application order.
        entries: Vec<JournalEntry>,
    },
    /// Every key of `family` removed at once.
    Reset {
        /// Sequence number of the reset.
        sequence: SequenceNumber,
        /// Family that was emptied.
        family: FamilyId,
    },
}

impl JournalRecord {
    /// Sequence number the record was published at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Batch { sequence, .. } | Self::Reset { sequence, .. } => *sequence,
        }
    }

    /// Envelope type of the record.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Batch { .. } => RecordType::Batch,
            Self::Reset { .. } => RecordType::Reset,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a key or value exceeds 4 GiB.
    pub fn encode_payload(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.sequence().as_u64().to_le_bytes());

        match self {
            Self::Batch { entries, .. } => {
                let count = u32::try_from(entries.len())
                    .map_err(|_| EngineError::invalid_argument("too many entries in batch"))?;
                buf.extend_from_slice(&count.to_le_bytes());

                for entry in entries {
                    buf.extend_from_slice(&entry.family.as_u32().to_le_bytes());
                    match &entry.value {
                        Some(value) => {
                            buf.push(OP_PUT);
                            put_bytes(&mut buf, &entry.key)?;
                            put_bytes(&mut buf, value)?;
                        }
                        None => {
                            buf.push(OP_DELETE);
                            put_bytes(&mut buf, &entry.key)?;
                        }
                    }
                }
            }
            Self::Reset { family, .. } => {
                buf.extend_from_slice(&family.as_u32().to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Deserializes a record payload of the given type.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the payload is malformed.
    pub fn decode_payload(record_type: RecordType, payload: &[u8]) -> EngineResult<Self> {
        let mut reader = ByteReader::new(payload, "journal record");
        let sequence = SequenceNumber::new(reader.u64()?);

        let record = match record_type {
            RecordType::Batch => {
                let count = reader.u32()? as usize;
                let mut entries = Vec::with_capacity(count.min(4096));
                for _ in 0..count {
                    let family = FamilyId::new(reader.u32()?);
                    let op = reader.u8()?;
                    let key = reader.bytes()?;
                    let value = match op {
                        OP_PUT => Some(reader.bytes()?),
                        OP_DELETE => None,
                        other => {
                            return Err(EngineError::corruption(format!(
                                "unknown journal operation: {other}"
                            )))
                        }
                    };
                    entries.push(JournalEntry { family, key, value });
                }
                Self::Batch { sequence, entries }
            }
            RecordType::Reset => Self::Reset {
                sequence,
                family: FamilyId::new(reader.u32()?),
            },
        };
        reader.expect_end()?;

        Ok(record)
    }
}

/// Append-only journal over a [`LogBackend`].
pub struct Journal {
    backend: Box<dyn LogBackend>,
}

impl Journal {
    /// Creates a journal over `backend`.
    pub fn new(backend: Box<dyn LogBackend>) -> Self {
        Self { backend }
    }

    /// Appends a record and returns the offset it was written at.
    ///
    /// A failed append leaves the journal as it was before the call.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the append fails.
    pub fn append(&mut self, record: &JournalRecord) -> EngineResult<u64> {
        let payload = record.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| EngineError::invalid_argument("journal record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(record.record_type() as u8);
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        self.backend.append(&data)
    }

    /// Makes every appended record durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> EngineResult<()> {
        self.backend.sync()
    }

    /// Cuts the journal back to `offset`, dropping a record that was
    /// appended but could not be made durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncation fails.
    pub fn rewind(&mut self, offset: u64) -> EngineResult<()> {
        self.backend.truncate(offset)
    }

    /// Returns the journal size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.backend.size()
    }

    /// Discards every record. Used after a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncation fails.
    pub fn clear(&mut self) -> EngineResult<()> {
        self.backend.truncate(0)
    }

    /// Reads back every complete record.
    ///
    /// A record cut short at the tail is dropped and the journal truncated to
    /// the end of the last complete record.
    ///
    /// # Errors
    ///
    /// Returns an error on bad magic, unsupported version, checksum mismatch
    /// or a malformed payload.
    pub fn recover(&mut self) -> EngineResult<Vec<JournalRecord>> {
        let size = self.backend.size();
        let mut offset = 0u64;
        let mut records = Vec::new();

        while offset < size {
            if size - offset < HEADER_SIZE as u64 {
                break;
            }
            let header = self.backend.read_at(offset, HEADER_SIZE)?;
            let mut reader = ByteReader::new(&header, "journal header");
            if reader.take(4)? != JOURNAL_MAGIC {
                return Err(EngineError::corruption(format!(
                    "invalid journal magic at offset {offset}"
                )));
            }
            let version = reader.u16()?;
            if version > JOURNAL_VERSION {
                return Err(EngineError::corruption(format!(
                    "unsupported journal version {version} at offset {offset}"
                )));
            }
            let type_byte = reader.u8()?;
            let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
                EngineError::corruption(format!(
                    "unknown journal record type {type_byte} at offset {offset}"
                ))
            })?;
            let len = reader.u32()? as usize;

            let total = (HEADER_SIZE + len + CRC_SIZE) as u64;
            if size - offset < total {
                break;
            }

            let data = self.backend.read_at(offset, total as usize)?;
            let body = crate::codec::split_checked(&data, "journal record")?;
            records.push(JournalRecord::decode_payload(
                record_type,
                &body[HEADER_SIZE..],
            )?);
            offset += total;
        }

        if offset < size {
            warn!(
                valid_bytes = offset,
                discarded = size - offset,
                "discarding incomplete journal tail"
            );
            self.backend.truncate(offset)?;
        }

        Ok(records)
    }
}
