//! Version 2 object headers: parsing (following continuation chunks) and
//! single-chunk writing.

use crate::bytes::{Cursor, PutLe};
use crate::checksum::jenkins_lookup3;
use crate::error::FormatError;
use crate::message::MessageType;

const OHDR: &[u8; 4] = b"OHDR";
const OCHK: &[u8; 4] = b"OCHK";

/// Message flag: the message must be understood by readers.
pub const MSG_FLAG_CONSTANT: u8 = 0x01;
const MSG_FLAG_MUST_UNDERSTAND: u8 = 0x08;

const FLAG_ATTR_ORDER_TRACKED: u8 = 0x04;
const FLAG_PHASE_CHANGE: u8 = 0x10;
const FLAG_TIMES: u8 = 0x20;

/// A single header message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMessage {
    pub msg_type: MessageType,
    pub flags: u8,
    pub data: Vec<u8>,
}

/// All messages of one object, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub messages: Vec<HeaderMessage>,
}

impl ObjectHeader {
    /// Parse the v2 object header at `addr`.
    pub fn parse(
        data: &[u8],
        addr: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        let mut c = Cursor::at(data, addr);
        match c.bytes(4)? {
            sig if sig == OHDR => {}
            sig if sig[0] == 1 => {
                return Err(FormatError::UnsupportedVersion {
                    what: "object header",
                    version: 1,
                })
            }
            _ => return Err(FormatError::BadSignature("OHDR")),
        }
        let version = c.u8()?;
        if version != 2 {
            return Err(FormatError::UnsupportedVersion {
                what: "object header",
                version,
            });
        }
        let flags = c.u8()?;
        if flags & FLAG_TIMES != 0 {
            c.skip(16)?;
        }
        if flags & FLAG_PHASE_CHANGE != 0 {
            c.skip(4)?;
        }
        let chunk_len = c.uint(1 << (flags & 0x03))? as usize;
        let body_start = c.pos();
        let order_tracked = flags & FLAG_ATTR_ORDER_TRACKED != 0;

        let sizes = (offset_size, length_size);
        let mut messages = Vec::new();
        let mut pending = Vec::new();
        read_chunk(data, addr, body_start, chunk_len, order_tracked, sizes, &mut messages, &mut pending)?;

        // continuation blocks may themselves hold further continuations
        while let Some((cont_addr, cont_len)) = pending.pop() {
            let mut cc = Cursor::at(data, cont_addr);
            if cc.bytes(4)? != OCHK {
                return Err(FormatError::BadSignature("OCHK"));
            }
            let body = cont_len.checked_sub(8).ok_or_else(|| {
                FormatError::Invalid(format!("continuation block of {cont_len} bytes"))
            })?;
            read_chunk(data, cont_addr, cont_addr + 4, body, order_tracked, sizes, &mut messages, &mut pending)?;
        }
        Ok(ObjectHeader { messages })
    }

    pub fn first(&self, kind: MessageType) -> Option<&HeaderMessage> {
        self.messages.iter().find(|m| m.msg_type == kind)
    }

    pub fn all(&self, kind: MessageType) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.msg_type == kind)
    }
}

/// Walk the messages of one chunk; checksum covers `start..body_end`.
#[allow(clippy::too_many_arguments)]
fn read_chunk(
    data: &[u8],
    start: usize,
    body_start: usize,
    body_len: usize,
    order_tracked: bool,
    (offset_size, length_size): (u8, u8),
    messages: &mut Vec<HeaderMessage>,
    pending: &mut Vec<(usize, usize)>,
) -> Result<(), FormatError> {
    let body_end = body_start + body_len;
    let mut c = Cursor::at(data, body_end);
    let stored = c.u32()?;
    let computed = jenkins_lookup3(&data[start..body_end]);
    if stored != computed {
        return Err(FormatError::ChecksumMismatch {
            expected: stored,
            computed,
        });
    }

    let header_len = if order_tracked { 6 } else { 4 };
    let mut c = Cursor::at(&data[..body_end], body_start);
    while c.remaining() >= header_len {
        let msg_type = MessageType::from_u16(u16::from(c.u8()?));
        let size = c.u16()? as usize;
        let flags = c.u8()?;
        if order_tracked {
            c.skip(2)?;
        }
        let body = c.bytes(size)?;
        if let MessageType::Other(id) = msg_type {
            if flags & MSG_FLAG_MUST_UNDERSTAND != 0 {
                return Err(FormatError::UnsupportedMessage(id));
            }
        }
        match msg_type {
            MessageType::Nil => {}
            MessageType::Continuation => {
                let mut cc = Cursor::new(body);
                let addr = cc.addr(offset_size)? as usize;
                let len = cc.uint(length_size)? as usize;
                pending.push((addr, len));
            }
            _ => messages.push(HeaderMessage {
                msg_type,
                flags,
                data: body.to_vec(),
            }),
        }
    }
    Ok(())
}

/// Builder for a single-chunk v2 object header.
#[derive(Debug, Default)]
pub struct ObjectHeaderWriter {
    messages: Vec<HeaderMessage>,
}

impl ObjectHeaderWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, msg_type: MessageType, data: Vec<u8>) {
        self.add_with_flags(msg_type, data, 0);
    }

    pub fn add_with_flags(&mut self, msg_type: MessageType, data: Vec<u8>, flags: u8) {
        self.messages.push(HeaderMessage {
            msg_type,
            flags,
            data,
        });
    }

    /// Encode `OHDR`, the messages and the trailing checksum.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut body = Vec::new();
        for m in &self.messages {
            let size = u16::try_from(m.data.len()).map_err(|_| {
                FormatError::Invalid(format!("{:?} message of {} bytes", m.msg_type, m.data.len()))
            })?;
            body.put_u8(m.msg_type.to_u16() as u8);
            body.put_u16(size);
            body.put_u8(m.flags);
            body.extend_from_slice(&m.data);
        }

        let mut buf = Vec::with_capacity(body.len() + 16);
        buf.extend_from_slice(OHDR);
        buf.put_u8(2);
        match body.len() {
            n if n <= 0xFF => {
                buf.put_u8(0x00);
                buf.put_u8(n as u8);
            }
            n if n <= 0xFFFF => {
                buf.put_u8(0x01);
                buf.put_u16(n as u16);
            }
            n => {
                buf.put_u8(0x02);
                buf.put_u32(n as u32);
            }
        }
        buf.extend_from_slice(&body);
        let sum = jenkins_lookup3(&buf);
        buf.put_u32(sum);
        Ok(buf)
    }
}
