//! Dataspace message (versions 1 and 2 on read, version 2 on write).

use crate::bytes::{Cursor, PutLe};
use crate::error::FormatError;

/// Max-dimension value meaning "unlimited".
pub const UNLIMITED: u64 = u64::MAX;

/// Shape of a dataset or attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dataspace {
    /// A single element with no dimensions.
    Scalar,
    /// No elements at all.
    Null,
    /// An N-dimensional array; `max_dims` is `None` when equal to `dims`.
    Simple {
        dims: Vec<u64>,
        max_dims: Option<Vec<u64>>,
    },
}

impl Dataspace {
    pub fn simple(dims: Vec<u64>) -> Self {
        Dataspace::Simple {
            dims,
            max_dims: None,
        }
    }

    /// One-dimensional, growable along its only axis.
    pub fn extendible(len: u64) -> Self {
        Dataspace::Simple {
            dims: vec![len],
            max_dims: Some(vec![UNLIMITED]),
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            Dataspace::Simple { dims, .. } => dims.len(),
            _ => 0,
        }
    }

    pub fn dims(&self) -> &[u64] {
        match self {
            Dataspace::Simple { dims, .. } => dims,
            _ => &[],
        }
    }

    pub fn num_elements(&self) -> u64 {
        match self {
            Dataspace::Scalar => 1,
            Dataspace::Null => 0,
            Dataspace::Simple { dims, .. } => dims.iter().product(),
        }
    }

    /// True when any dimension may grow past its current size.
    pub fn is_extendible(&self) -> bool {
        match self {
            Dataspace::Simple {
                dims,
                max_dims: Some(max),
            } => max.iter().zip(dims).any(|(m, d)| *m == UNLIMITED || m > d),
            _ => false,
        }
    }

    pub fn parse(data: &[u8], length_size: u8) -> Result<Dataspace, FormatError> {
        let mut c = Cursor::new(data);
        let version = c.u8()?;
        let rank = c.u8()? as usize;
        let flags = c.u8()?;
        let kind = match version {
            1 => {
                c.skip(5)?;
                if rank == 0 {
                    0
                } else {
                    1
                }
            }
            2 => c.u8()?,
            v => {
                return Err(FormatError::UnsupportedVersion {
                    what: "dataspace",
                    version: v,
                })
            }
        };
        match kind {
            0 => return Ok(Dataspace::Scalar),
            2 => return Ok(Dataspace::Null),
            1 => {}
            k => return Err(FormatError::Invalid(format!("dataspace type {k}"))),
        }
        let dims = (0..rank)
            .map(|_| c.uint(length_size))
            .collect::<Result<Vec<_>, _>>()?;
        let max_dims = if flags & 0x01 != 0 {
            let max = (0..rank)
                .map(|_| c.uint(length_size).map(|m| widen_unlimited(m, length_size)))
                .collect::<Result<Vec<_>, _>>()?;
            Some(max)
        } else {
            None
        };
        Ok(Dataspace::Simple { dims, max_dims })
    }

    /// Encode as a version 2 message with 8-byte lengths.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![2];
        match self {
            Dataspace::Scalar => buf.extend_from_slice(&[0, 0, 0]),
            Dataspace::Null => buf.extend_from_slice(&[0, 0, 2]),
            Dataspace::Simple { dims, max_dims } => {
                buf.put_u8(dims.len() as u8);
                buf.put_u8(u8::from(max_dims.is_some()));
                buf.put_u8(1);
                for &d in dims {
                    buf.put_u64(d);
                }
                for &m in max_dims.iter().flatten() {
                    buf.put_u64(m);
                }
            }
        }
        buf
    }
}

fn widen_unlimited(raw: u64, width: u8) -> u64 {
    if width < 8 && raw == (1u64 << (u32::from(width) * 8)) - 1 {
        UNLIMITED
    } else {
        raw
    }
}
