//! Attribute message (versions 1-3 on read, version 3 on write).

use crate::bytes::{Cursor, PutLe};
use crate::dataspace::Dataspace;
use crate::datatype::{ByteOrder, Datatype};
use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub data: Vec<u8>,
}

impl Attribute {
    /// Scalar little-endian `i32` attribute.
    pub fn scalar_i32(name: &str, value: i32) -> Self {
        Self {
            name: name.to_string(),
            datatype: Datatype::FixedPoint {
                size: 4,
                byte_order: ByteOrder::LittleEndian,
                signed: true,
            },
            dataspace: Dataspace::Scalar,
            data: value.to_le_bytes().to_vec(),
        }
    }

    pub fn parse(data: &[u8], length_size: u8) -> Result<Attribute, FormatError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        if !(1..=3).contains(&version) {
            return Err(FormatError::UnsupportedVersion {
                what: "attribute",
                version,
            });
        }
        let flags = c.u8()?;
        if flags & 0x03 != 0 {
            return Err(FormatError::Unsupported("shared attribute datatype or dataspace".into()));
        }
        let name_size = c.u16()? as usize;
        let dt_size = c.u16()? as usize;
        let ds_size = c.u16()? as usize;
        if version == 3 {
            c.u8()?; // name encoding
        }
        // version 1 pads every field to eight bytes
        let padded = |n: usize| if version == 1 { n.div_ceil(8) * 8 } else { n };

        let raw_name = c.bytes(padded(name_size))?;
        let end = raw_name[..name_size.min(raw_name.len())]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_size);
        let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();
        let (datatype, _) = Datatype::parse(c.bytes(padded(dt_size))?)?;
        let dataspace = Dataspace::parse(c.bytes(padded(ds_size))?, length_size)?;

        let len = (dataspace.num_elements() * u64::from(datatype.size())) as usize;
        let data = c.bytes(len.min(c.remaining()))?.to_vec();
        Ok(Attribute {
            name,
            datatype,
            dataspace,
            data,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut name = self.name.as_bytes().to_vec();
        name.push(0);
        let dt = self.datatype.serialize()?;
        let ds = self.dataspace.serialize();

        let mut buf = vec![3, 0];
        buf.put_u16(name.len() as u16);
        buf.put_u16(dt.len() as u16);
        buf.put_u16(ds.len() as u16);
        buf.put_u8(1); // UTF-8 name
        buf.extend_from_slice(&name);
        buf.extend_from_slice(&dt);
        buf.extend_from_slice(&ds);
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let attr = Attribute::scalar_i32("__conduit_list", 1);
        let back = Attribute::parse(&attr.serialize().unwrap(), 8).unwrap();
        assert_eq!(back, attr);
    }

    #[test]
    fn version1_padding() {
        let attr = Attribute::scalar_i32("ab", -5);
        let dt = attr.datatype.serialize().unwrap();
        let ds = attr.dataspace.serialize();
        let mut msg = vec![1, 0];
        msg.extend_from_slice(&3u16.to_le_bytes());
        msg.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        msg.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        msg.extend_from_slice(b"ab\0\0\0\0\0\0");
        msg.extend_from_slice(&dt);
        msg.resize(msg.len() + (8 - dt.len() % 8) % 8, 0);
        msg.extend_from_slice(&ds);
        msg.resize(msg.len() + (8 - ds.len() % 8) % 8, 0);
        msg.extend_from_slice(&(-5i32).to_le_bytes());
        let back = Attribute::parse(&msg, 8).unwrap();
        assert_eq!(back, attr);
    }
}
