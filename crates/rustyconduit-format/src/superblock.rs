//! Superblock versions 2 and 3, plus locating the file signature.

use crate::bytes::{Cursor, PutLe, UNDEF_ADDR};
use crate::checksum::jenkins_lookup3;
use crate::error::FormatError;

/// The 8-byte HDF5 magic signature.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'];

/// Encoded size of a v2/v3 superblock with 8-byte offsets.
pub const SUPERBLOCK_SIZE: usize = 48;

/// Find the signature at offset 0, 512, 1024, 2048, ...
pub fn find_signature(data: &[u8]) -> Result<usize, FormatError> {
    let mut offset = 0;
    while offset + 8 <= data.len() {
        if data[offset..offset + 8] == HDF5_SIGNATURE {
            return Ok(offset);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Err(FormatError::SignatureNotFound)
}

/// Parsed v2/v3 superblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub version: u8,
    /// Size of file addresses in bytes.
    pub offset_size: u8,
    /// Size of lengths in bytes.
    pub length_size: u8,
    pub consistency_flags: u8,
    pub base_address: u64,
    pub extension_address: u64,
    pub eof_address: u64,
    pub root_group_address: u64,
}

impl Superblock {
    /// Superblock for a file this crate writes.
    pub fn for_writing(root_group_address: u64, eof_address: u64) -> Self {
        Self {
            version: 3,
            offset_size: 8,
            length_size: 8,
            consistency_flags: 0,
            base_address: 0,
            extension_address: UNDEF_ADDR,
            eof_address,
            root_group_address,
        }
    }

    /// Parse the superblock that starts at `at`.
    pub fn parse(data: &[u8], at: usize) -> Result<Superblock, FormatError> {
        let mut c = Cursor::at(data, at);
        if c.bytes(8)? != HDF5_SIGNATURE {
            return Err(FormatError::SignatureNotFound);
        }
        let version = c.u8()?;
        if !matches!(version, 2 | 3) {
            return Err(FormatError::UnsupportedVersion {
                what: "superblock",
                version,
            });
        }
        let offset_size = c.u8()?;
        let length_size = c.u8()?;
        for size in [offset_size, length_size] {
            if !matches!(size, 2 | 4 | 8) {
                return Err(FormatError::Invalid(format!("field size {size}")));
            }
        }
        let consistency_flags = c.u8()?;
        let base_address = c.addr(offset_size)?;
        let extension_address = c.addr(offset_size)?;
        let eof_address = c.addr(offset_size)?;
        let root_group_address = c.addr(offset_size)?;

        let end = c.pos();
        let stored = c.u32()?;
        let computed = jenkins_lookup3(&data[at..end]);
        if stored != computed {
            return Err(FormatError::ChecksumMismatch {
                expected: stored,
                computed,
            });
        }

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            consistency_flags,
            base_address,
            extension_address,
            eof_address,
            root_group_address,
        })
    }

    /// Encode with 8-byte addresses (the only width the writer emits).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SUPERBLOCK_SIZE);
        buf.extend_from_slice(&HDF5_SIGNATURE);
        buf.put_u8(self.version);
        buf.put_u8(8);
        buf.put_u8(8);
        buf.put_u8(self.consistency_flags);
        buf.put_u64(self.base_address);
        buf.put_u64(self.extension_address);
        buf.put_u64(self.eof_address);
        buf.put_u64(self.root_group_address);
        let sum = jenkins_lookup3(&buf);
        buf.put_u32(sum);
        buf
    }
}
