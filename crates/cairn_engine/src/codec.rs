//! Little-endian helpers shared by the on-disk formats.

use crate::error::{EngineError, EngineResult};

/// Computes the CRC32 checksum used by every engine file.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Appends a length-prefixed byte string.
pub(crate) fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> EngineResult<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| EngineError::invalid_argument("byte string exceeds 4 GiB"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Cursor over an encoded buffer. Every read is bounds-checked and reports
/// a corruption error naming `context` on underflow.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    cursor: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            cursor: 0,
            context,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.cursor
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub(crate) fn take(&mut self, len: usize) -> EngineResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(EngineError::corruption(format!(
                "{} too short: needed {len} bytes at offset {}",
                self.context, self.cursor
            )));
        }
        let slice = &self.data[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> EngineResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u32(&mut self) -> EngineResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn u64(&mut self) -> EngineResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    pub(crate) fn bytes(&mut self) -> EngineResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub(crate) fn expect_end(&self) -> EngineResult<()> {
        if self.remaining() != 0 {
            return Err(EngineError::corruption(format!(
                "trailing bytes in {}: {} unread",
                self.context,
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// Splits `data` into body and trailing CRC, verifying the checksum.
pub(crate) fn split_checked<'a>(
    data: &'a [u8],
    context: &'static str,
) -> EngineResult<&'a [u8]> {
    if data.len() < 4 {
        return Err(EngineError::corruption(format!("{context} too short")));
    }
    let (body, crc_bytes) = data.split_at(data.len() - 4);
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let actual = compute_crc32(body);
    if expected != actual {
        return Err(EngineError::ChecksumMismatch { expected, actual });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_underflow() {
        let mut reader = ByteReader::new(&[1, 0], "test buffer");
        assert_eq!(reader.u16().unwrap(), 1);
        let err = reader.u8().unwrap_err();
        assert!(err.to_string().contains("test buffer too short"));
    }

    #[test]
    fn checked_split_detects_flip() {
        let mut data = b"payload".to_vec();
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(split_checked(&data, "blob").unwrap(), b"payload");

        data[0] ^= 0xFF;
        assert!(matches!(
            split_checked(&data, "blob"),
            Err(EngineError::ChecksumMismatch { .. })
        ));
    }
}
