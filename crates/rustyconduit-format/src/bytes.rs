//! Little-endian cursor and append helpers shared by every message codec.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// The "undefined address" value (all bits set).
pub const UNDEF_ADDR: u64 = u64::MAX;

/// Forward-only reader over a byte slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn ensure(&self, n: usize) -> Result<(), FormatError> {
        if self.pos + n > self.data.len() {
            return Err(FormatError::UnexpectedEof {
                expected: self.pos + n,
                available: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        self.ensure(n)?;
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.bytes(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, FormatError> {
        Ok(LittleEndian::read_u16(self.bytes(2)?))
    }

    pub fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(LittleEndian::read_u32(self.bytes(4)?))
    }

    pub fn u64(&mut self) -> Result<u64, FormatError> {
        Ok(LittleEndian::read_u64(self.bytes(8)?))
    }

    /// Unsigned integer of 1, 2, 4 or 8 bytes.
    pub fn uint(&mut self, width: u8) -> Result<u64, FormatError> {
        match width {
            1 => self.u8().map(u64::from),
            2 => self.u16().map(u64::from),
            4 => self.u32().map(u64::from),
            8 => self.u64(),
            w => Err(FormatError::Invalid(format!("integer width {w}"))),
        }
    }

    /// File address of `width` bytes; all-ones maps to [`UNDEF_ADDR`].
    pub fn addr(&mut self, width: u8) -> Result<u64, FormatError> {
        let raw = self.uint(width)?;
        if width < 8 && raw == (1u64 << (u32::from(width) * 8)) - 1 {
            return Ok(UNDEF_ADDR);
        }
        Ok(raw)
    }

    /// NUL-terminated string; the terminator is consumed.
    pub fn cstr(&mut self) -> Result<String, FormatError> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let len = rest.iter().position(|&b| b == 0).ok_or(FormatError::UnexpectedEof {
            expected: self.data.len() + 1,
            available: self.data.len(),
        })?;
        let s = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(s)
    }
}

/// Append helpers for building little-endian structures.
pub trait PutLe {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_u64(&mut self, v: u64);
}

impl PutLe for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.extend_from_slice(&v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_mixed_widths() {
        let data = [1u8, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff, b'h', b'i', 0, 9];
        let mut c = Cursor::new(&data);
        assert_eq!(c.u8().unwrap(), 1);
        assert_eq!(c.u16().unwrap(), 0x1234);
        assert_eq!(c.addr(4).unwrap(), UNDEF_ADDR);
        assert_eq!(c.cstr().unwrap(), "hi");
        assert_eq!(c.remaining(), 1);
        assert!(matches!(c.u16(), Err(FormatError::UnexpectedEof { .. })));
    }

    #[test]
    fn put_round_trips() {
        let mut buf = Vec::new();
        buf.put_u16(0xbeef);
        buf.put_u64(42);
        let mut c = Cursor::new(&buf);
        assert_eq!(c.u16().unwrap(), 0xbeef);
        assert_eq!(c.uint(8).unwrap(), 42);
    }
}
