//! Compiled module format
//!
//! Layout (little-endian):
//!
//! - magic `LOOM` (4 bytes), format version (u32)
//! - module name, unit version (length-prefixed UTF-8)
//! - reference table: count, then name / version / location per entry
//! - SHA-256 of the source text (32 bytes)
//! - class payload: length-prefixed JSON
//! - CRC32 of everything before it (u32)

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::ir::IrClass;

/// Magic number for Loom modules: "LOOM"
pub const MAGIC: [u8; 4] = *b"LOOM";

/// Current module format version
pub const VERSION: u32 = 1;

/// Module encoding/decoding errors
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Unexpected end of input
    #[error("Unexpected end of module at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid magic number
    #[error("Invalid magic number: expected LOOM, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// Class payload could not be decoded
    #[error("Invalid class payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Trailing bytes after the checksum
    #[error("Unexpected trailing data at offset {0}")]
    TrailingData(usize),
}

/// A unit the module was compiled against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub name: String,
    pub version: String,
    /// Where the unit was loaded from, when known
    pub location: Option<String>,
}

/// An encoded compilation result.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Module (unit) name
    pub name: String,
    /// Unit version reported by the loaded module
    pub version: String,
    /// Units referenced at compile time
    pub references: Vec<ModuleReference>,
    /// SHA-256 of the source text
    pub source_hash: [u8; 32],
    /// The defined class
    pub class: IrClass,
}

impl Module {
    /// Hex form of the source hash.
    pub fn source_hash_hex(&self) -> String {
        hex::encode(self.source_hash)
    }

    /// Encode the module to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ModuleError> {
        let mut writer = ModuleWriter::new();
        writer.buffer.extend_from_slice(&MAGIC);
        writer.emit_u32(VERSION);
        writer.emit_str(&self.name);
        writer.emit_str(&self.version);

        writer.emit_u32(self.references.len() as u32);
        for reference in &self.references {
            writer.emit_str(&reference.name);
            writer.emit_str(&reference.version);
            match &reference.location {
                Some(location) => {
                    writer.emit_u8(1);
                    writer.emit_str(location);
                }
                None => writer.emit_u8(0),
            }
        }

        writer.buffer.extend_from_slice(&self.source_hash);

        let payload = serde_json::to_vec(&self.class)?;
        writer.emit_u32(payload.len() as u32);
        writer.buffer.extend_from_slice(&payload);

        let crc = crc32fast::hash(&writer.buffer);
        writer.emit_u32(crc);
        Ok(writer.into_bytes())
    }

    /// Decode a module, verifying magic, version and checksum.
    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        if data.len() < 12 {
            return Err(ModuleError::UnexpectedEnd(data.len()));
        }
        let (body, tail) = data.split_at(data.len() - 4);
        let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);

        let mut reader = ModuleReader::new(body);
        let magic = reader.read_array::<4>()?;
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }
        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let actual = crc32fast::hash(body);
        if stored != actual {
            return Err(ModuleError::ChecksumMismatch { expected: stored, actual });
        }

        let name = reader.read_str()?;
        let unit_version = reader.read_str()?;

        let count = reader.read_u32()? as usize;
        let mut references = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let name = reader.read_str()?;
            let version = reader.read_str()?;
            let location = match reader.read_u8()? {
                0 => None,
                _ => Some(reader.read_str()?),
            };
            references.push(ModuleReference { name, version, location });
        }

        let source_hash = reader.read_array::<32>()?;
        let len = reader.read_u32()? as usize;
        let payload = reader.read_bytes(len)?;
        let class: IrClass = serde_json::from_slice(payload)?;

        if reader.remaining() != 0 {
            return Err(ModuleError::TrailingData(reader.offset()));
        }

        Ok(Self {
            name,
            version: unit_version,
            references,
            source_hash,
            class,
        })
    }

    /// SHA-256 of arbitrary source text.
    pub fn hash_source(source: &str) -> [u8; 32] {
        Sha256::digest(source.as_bytes()).into()
    }

    /// SHA-256 of an encoded module, used as its content identity.
    pub fn hash_bytes(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}

struct ModuleWriter {
    buffer: Vec<u8>,
}

impl ModuleWriter {
    fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn emit_str(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }
}

struct ModuleReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ModuleReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ModuleError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(ModuleError::UnexpectedEnd(self.offset))?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ModuleError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, ModuleError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, ModuleError> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    fn read_str(&mut self) -> Result<String, ModuleError> {
        let len = self.read_u32()? as usize;
        let start = self.offset;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ModuleError::InvalidUtf8(start))
    }
}
