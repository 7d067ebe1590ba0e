//! Datatype message: the classes a conduit leaf can map to, plus
//! variable-length types on read so other tools' files can be inspected.

use crate::bytes::{Cursor, PutLe};
use crate::error::FormatError;

/// Byte order of a numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    NullTerminate,
    NullPad,
    SpacePad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

/// Parsed HDF5 datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datatype {
    /// Class 0: integers.
    FixedPoint {
        size: u32,
        byte_order: ByteOrder,
        signed: bool,
    },
    /// Class 1: IEEE floats (4 or 8 bytes).
    FloatingPoint { size: u32, byte_order: ByteOrder },
    /// Class 3: fixed-length string of `size` bytes.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Class 5: uninterpreted bytes with an ASCII tag.
    Opaque { size: u32, tag: String },
    /// Class 9: variable-length sequence or string (read only).
    VariableLength { is_string: bool, base: Box<Datatype> },
    /// Any other class; kept so objects can still be listed.
    Other { class: u8, size: u32 },
}

impl Datatype {
    /// Parse a datatype; returns the bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Datatype, usize), FormatError> {
        let mut c = Cursor::new(data);
        let class_and_version = c.u8()?;
        let class = class_and_version & 0x0F;
        let bits = c.bytes(3)?;
        let bf0 = bits[0];
        let size = c.u32()?;
        let order = if bf0 & 0x01 == 0 {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        };

        let dt = match class {
            0 => {
                c.skip(4)?; // bit offset, precision
                Datatype::FixedPoint {
                    size,
                    byte_order: order,
                    signed: bf0 & 0x08 != 0,
                }
            }
            1 => {
                c.skip(12)?;
                if bf0 & 0x40 != 0 {
                    return Err(FormatError::Unsupported("VAX float byte order".into()));
                }
                Datatype::FloatingPoint {
                    size,
                    byte_order: order,
                }
            }
            3 => Datatype::String {
                size,
                padding: padding_from(bf0 & 0x0F)?,
                charset: charset_from(bf0 >> 4)?,
            },
            5 => {
                let tag_len = bf0 as usize;
                let raw = c.bytes(tag_len)?;
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                Datatype::Opaque {
                    size,
                    tag: String::from_utf8_lossy(&raw[..end]).into_owned(),
                }
            }
            9 => {
                let is_string = bf0 & 0x0F == 1;
                let (base, used) = Datatype::parse(&data[c.pos()..])?;
                c.skip(used)?;
                Datatype::VariableLength {
                    is_string,
                    base: Box::new(base),
                }
            }
            other => {
                return Ok((Datatype::Other { class: other, size }, data.len()));
            }
        };
        Ok((dt, c.pos()))
    }

    /// Encode as a version 1 datatype message.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut buf = Vec::with_capacity(24);
        match self {
            Datatype::FixedPoint {
                size,
                byte_order,
                signed,
            } => {
                let bf0 = order_bit(*byte_order) | if *signed { 0x08 } else { 0 };
                header(&mut buf, 0, [bf0, 0, 0], *size);
                buf.put_u16(0);
                buf.put_u16((*size * 8) as u16);
            }
            Datatype::FloatingPoint { size, byte_order } => {
                // exponent location/size, mantissa location/size, bias
                let (sign, exp_loc, exp_size, mant_size, bias): (u8, u8, u8, u8, u32) = match size {
                    4 => (31, 23, 8, 23, 127),
                    8 => (63, 52, 11, 52, 1023),
                    s => return Err(FormatError::Unsupported(format!("{s}-byte float"))),
                };
                header(&mut buf, 1, [0x20 | order_bit(*byte_order), sign, 0], *size);
                buf.put_u16(0);
                buf.put_u16((*size * 8) as u16);
                buf.extend_from_slice(&[exp_loc, exp_size, 0, mant_size]);
                buf.put_u32(bias);
            }
            Datatype::String {
                size,
                padding,
                charset,
            } => {
                let pad = match padding {
                    StringPadding::NullTerminate => 0,
                    StringPadding::NullPad => 1,
                    StringPadding::SpacePad => 2,
                };
                let cset = match charset {
                    CharacterSet::Ascii => 0,
                    CharacterSet::Utf8 => 1,
                };
                header(&mut buf, 3, [pad | (cset << 4), 0, 0], *size);
            }
            Datatype::Opaque { size, tag } => {
                let padded = (tag.len() + 1).div_ceil(8) * 8;
                let tag_len = u8::try_from(padded)
                    .map_err(|_| FormatError::Invalid(format!("opaque tag of {} bytes", tag.len())))?;
                header(&mut buf, 5, [tag_len, 0, 0], *size);
                buf.extend_from_slice(tag.as_bytes());
                buf.resize(buf.len() + padded - tag.len(), 0);
            }
            Datatype::VariableLength { .. } | Datatype::Other { .. } => {
                return Err(FormatError::Unsupported(format!("writing datatype {self:?}")));
            }
        }
        Ok(buf)
    }

    /// Size in bytes of one element.
    pub fn size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::String { size, .. }
            | Datatype::Opaque { size, .. }
            | Datatype::Other { size, .. } => *size,
            // heap id: length(4) + collection address(8) + index(4)
            Datatype::VariableLength { .. } => 16,
        }
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        match self {
            Datatype::FixedPoint { byte_order, .. } | Datatype::FloatingPoint { byte_order, .. } => {
                Some(*byte_order)
            }
            _ => None,
        }
    }
}

fn header(buf: &mut Vec<u8>, class: u8, bits: [u8; 3], size: u32) {
    buf.put_u8(class | (1 << 4));
    buf.extend_from_slice(&bits);
    buf.put_u32(size);
}

fn order_bit(order: ByteOrder) -> u8 {
    match order {
        ByteOrder::LittleEndian => 0,
        ByteOrder::BigEndian => 1,
    }
}

fn padding_from(v: u8) -> Result<StringPadding, FormatError> {
    match v {
        0 => Ok(StringPadding::NullTerminate),
        1 => Ok(StringPadding::NullPad),
        2 => Ok(StringPadding::SpacePad),
        v => Err(FormatError::Invalid(format!("string padding {v}"))),
    }
}

fn charset_from(v: u8) -> Result<CharacterSet, FormatError> {
    match v {
        0 => Ok(CharacterSet::Ascii),
        1 => Ok(CharacterSet::Utf8),
        v => Err(FormatError::Invalid(format!("character set {v}"))),
    }
}
