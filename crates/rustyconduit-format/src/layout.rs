//! Data layout (v3 write, v3/v4 read) and fill value messages.

use crate::bytes::{Cursor, PutLe};
use crate::error::FormatError;

/// How a dataset's raw bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Bytes inline in the object header.
    Compact { data: Vec<u8> },
    /// One block at `address` (undefined when `size` is zero).
    Contiguous { address: u64, size: u64 },
    /// Chunks indexed by a v1 B-tree. `dims` ends with the element size.
    Chunked { btree_address: u64, dims: Vec<u32> },
}

impl DataLayout {
    pub fn parse(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if !matches!(version, 3 | 4) {
            return Err(FormatError::UnsupportedVersion {
                what: "data layout",
                version,
            });
        }
        match c.u8()? {
            0 => {
                let size = c.u16()? as usize;
                Ok(DataLayout::Compact {
                    data: c.bytes(size)?.to_vec(),
                })
            }
            1 => Ok(DataLayout::Contiguous {
                address: c.addr(offset_size)?,
                size: c.uint(length_size)?,
            }),
            2 if version == 3 => {
                let rank = c.u8()? as usize;
                let btree_address = c.addr(offset_size)?;
                let dims = (0..rank).map(|_| c.u32()).collect::<Result<Vec<_>, _>>()?;
                Ok(DataLayout::Chunked {
                    btree_address,
                    dims,
                })
            }
            2 => Err(FormatError::Unsupported(
                "version 4 chunk indexes (fixed/extensible array, v2 B-tree)".into(),
            )),
            3 => Err(FormatError::Unsupported("virtual dataset layout".into())),
            class => Err(FormatError::Invalid(format!("layout class {class}"))),
        }
    }

    /// Encode as a version 3 message with 8-byte addresses and lengths.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut buf = vec![3];
        match self {
            DataLayout::Compact { data } => {
                let size = u16::try_from(data.len()).map_err(|_| {
                    FormatError::Invalid(format!("compact data of {} bytes", data.len()))
                })?;
                buf.put_u8(0);
                buf.put_u16(size);
                buf.extend_from_slice(data);
            }
            DataLayout::Contiguous { address, size } => {
                buf.put_u8(1);
                buf.put_u64(*address);
                buf.put_u64(*size);
            }
            DataLayout::Chunked {
                btree_address,
                dims,
            } => {
                buf.put_u8(2);
                buf.put_u8(dims.len() as u8);
                buf.put_u64(*btree_address);
                for &d in dims {
                    buf.put_u32(d);
                }
            }
        }
        Ok(buf)
    }
}

/// Fill value message (version 3): fill written if set, no explicit value.
/// Chunked storage allocates incrementally, everything else late.
pub fn fill_value_message(chunked: bool) -> Vec<u8> {
    let alloc_time: u8 = if chunked { 3 } else { 2 };
    vec![3, alloc_time | (2 << 2)]
}
