//! Link, link-info and group-info messages of new-style (compact) groups.

use crate::bytes::{Cursor, PutLe, UNDEF_ADDR};
use crate::error::FormatError;

const FLAG_ORDER_PRESENT: u8 = 0x04;
const FLAG_TYPE_PRESENT: u8 = 0x08;
const FLAG_CHARSET_PRESENT: u8 = 0x10;

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Hard(u64),
    Soft(String),
    External { file: String, path: String },
}

/// One named link stored in a group's object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub name: String,
    pub creation_order: Option<u64>,
    pub target: LinkTarget,
}

impl LinkMessage {
    pub fn hard(name: &str, addr: u64, creation_order: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            creation_order,
            target: LinkTarget::Hard(addr),
        }
    }

    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkMessage, FormatError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != 1 {
            return Err(FormatError::UnsupportedVersion {
                what: "link",
                version,
            });
        }
        let flags = c.u8()?;
        let link_type = if flags & FLAG_TYPE_PRESENT != 0 { c.u8()? } else { 0 };
        let creation_order = if flags & FLAG_ORDER_PRESENT != 0 {
            Some(c.u64()?)
        } else {
            None
        };
        if flags & FLAG_CHARSET_PRESENT != 0 {
            c.u8()?;
        }
        let name_len = c.uint(1 << (flags & 0x03))? as usize;
        let name = String::from_utf8_lossy(c.bytes(name_len)?).into_owned();

        let target = match link_type {
            0 => LinkTarget::Hard(c.addr(offset_size)?),
            1 => {
                let len = c.u16()? as usize;
                LinkTarget::Soft(String::from_utf8_lossy(c.bytes(len)?).into_owned())
            }
            64 => {
                let len = c.u16()? as usize;
                let mut ext = Cursor::new(c.bytes(len)?);
                ext.u8()?;
                LinkTarget::External {
                    file: ext.cstr()?,
                    path: ext.cstr()?,
                }
            }
            t => return Err(FormatError::Unsupported(format!("link type {t}"))),
        };
        Ok(LinkMessage {
            name,
            creation_order,
            target,
        })
    }

    /// Encode a hard link with 8-byte addresses.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let LinkTarget::Hard(addr) = self.target else {
            return Err(FormatError::Unsupported("writing soft or external links".into()));
        };
        let name = self.name.as_bytes();
        let (width_bits, width) = match name.len() {
            n if n <= 0xFF => (0u8, 1usize),
            n if n <= 0xFFFF => (1, 2),
            _ => (2, 4),
        };
        let mut flags = width_bits | FLAG_CHARSET_PRESENT;
        if self.creation_order.is_some() {
            flags |= FLAG_ORDER_PRESENT;
        }

        let mut buf = vec![1, flags];
        if let Some(order) = self.creation_order {
            buf.put_u64(order);
        }
        buf.put_u8(1); // UTF-8
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes()[..width]);
        buf.extend_from_slice(name);
        buf.put_u64(addr);
        Ok(buf)
    }
}

/// Link info message: whether creation order is tracked and where dense
/// storage lives (undefined for compact groups).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub track_creation_order: bool,
    pub max_creation_index: Option<u64>,
    pub fractal_heap_address: u64,
    pub name_index_address: u64,
}

impl LinkInfo {
    pub fn compact(track_creation_order: bool, max_creation_index: u64) -> Self {
        Self {
            track_creation_order,
            max_creation_index: track_creation_order.then_some(max_creation_index),
            fractal_heap_address: UNDEF_ADDR,
            name_index_address: UNDEF_ADDR,
        }
    }

    pub fn is_dense(&self) -> bool {
        self.fractal_heap_address != UNDEF_ADDR
    }

    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkInfo, FormatError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if version != 0 {
            return Err(FormatError::UnsupportedVersion {
                what: "link info",
                version,
            });
        }
        let flags = c.u8()?;
        let max_creation_index = if flags & 0x01 != 0 { Some(c.u64()?) } else { None };
        Ok(LinkInfo {
            track_creation_order: flags & 0x01 != 0,
            max_creation_index,
            fractal_heap_address: c.addr(offset_size)?,
            name_index_address: c.addr(offset_size)?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0, u8::from(self.track_creation_order)];
        if self.track_creation_order {
            buf.put_u64(self.max_creation_index.unwrap_or(0));
        }
        buf.put_u64(self.fractal_heap_address);
        buf.put_u64(self.name_index_address);
        buf
    }
}

/// Group info message with default phase-change values.
pub fn group_info_message() -> Vec<u8> {
    vec![0, 0]
}
