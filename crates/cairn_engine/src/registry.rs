//! Column family registry persisted in the `FAMILIES` file.

use crate::codec::{compute_crc32, put_bytes, split_checked, ByteReader};
use crate::error::{EngineError, EngineResult};
use crate::types::FamilyId;
use std::collections::BTreeMap;

/// Magic bytes for the registry file.
pub const REGISTRY_MAGIC: [u8; 4] = *b"CFAM";

/// Current registry format version.
pub const REGISTRY_VERSION: u16 = 1;

/// Name of the family that exists in every database.
pub const DEFAULT_FAMILY_NAME: &[u8] = b"default";

/// Mapping of column family names to ids.
///
/// The registry is the single source of truth for which families exist on
/// disk. It is rewritten atomically whenever a family is created or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyRegistry {
    families: BTreeMap<FamilyId, Vec<u8>>,
    next_id: u32,
}

impl Default for FamilyRegistry {
    fn default() -> Self {
        let mut families = BTreeMap::new();
        families.insert(FamilyId::DEFAULT, DEFAULT_FAMILY_NAME.to_vec());
        Self {
            families,
            next_id: 1,
        }
    }
}

impl FamilyRegistry {
    /// Looks up the id of a family by name.
    #[must_use]
    pub fn id_of(&self, name: &[u8]) -> Option<FamilyId> {
        self.families
            .iter()
            .find(|(_, existing)| existing.as_slice() == name)
            .map(|(id, _)| *id)
    }

    /// Registers a new family and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `ColumnFamilyExists` if the name is taken.
    pub fn register(&mut self, name: &[u8]) -> EngineResult<FamilyId> {
        if self.id_of(name).is_some() {
            return Err(EngineError::ColumnFamilyExists {
                name: name.to_vec(),
            });
        }
        let id = FamilyId::new(self.next_id);
        self.next_id += 1;
        self.families.insert(id, name.to_vec());
        Ok(id)
    }

    /// Removes a family by id, returning its name.
    pub fn remove(&mut self, id: FamilyId) -> Option<Vec<u8>> {
        self.families.remove(&id)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: FamilyId) -> bool {
        self.families.contains_key(&id)
    }

    /// Iterates `(id, name)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (FamilyId, &[u8])> {
        self.families.iter().map(|(id, name)| (*id, name.as_slice()))
    }

    /// Returns every registered name in id order.
    #[must_use]
    pub fn names(&self) -> Vec<Vec<u8>> {
        self.families.values().cloned().collect()
    }

    /// Encodes the registry to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a name exceeds 4 GiB.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&REGISTRY_MAGIC);
        buf.extend_from_slice(&REGISTRY_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.next_id.to_le_bytes());
        let count = u32::try_from(self.families.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());
        for (id, name) in &self.families {
            buf.extend_from_slice(&id.as_u32().to_le_bytes());
            put_bytes(&mut buf, name)?;
        }
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a registry from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on bad magic, unsupported version, checksum
    /// mismatch or truncation.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        let body = split_checked(data, "family registry")?;
        let mut reader = ByteReader::new(body, "family registry");

        if reader.take(4)? != REGISTRY_MAGIC {
            return Err(EngineError::corruption("invalid family registry magic"));
        }
        let version = reader.u16()?;
        if version > REGISTRY_VERSION {
            return Err(EngineError::corruption(format!(
                "unsupported family registry version: {version}"
            )));
        }
        let next_id = reader.u32()?;
        let count = reader.u32()? as usize;

        let mut families = BTreeMap::new();
        for _ in 0..count {
            let id = FamilyId::new(reader.u32()?);
            let name = reader.bytes()?;
            if id.as_u32() >= next_id {
                return Err(EngineError::corruption(format!(
                    "family id {id} not below next id {next_id}"
                )));
            }
            families.insert(id, name);
        }
        reader.expect_end()?;

        if !families.contains_key(&FamilyId::DEFAULT) {
            return Err(EngineError::corruption("family registry lacks default family"));
        }

        Ok(Self { families, next_id })
    }
}
