//! Filter pipeline message (versions 1 and 2 on read, 2 on write).

use rustyconduit_filters::FilterSpec;

use crate::bytes::{Cursor, PutLe};
use crate::error::FormatError;

const FLAG_OPTIONAL: u16 = 0x0001;

pub fn parse_pipeline(data: &[u8]) -> Result<Vec<FilterSpec>, FormatError> {
    let mut c = Cursor::new(data);
    let version = c.u8()?;
    let count = c.u8()? as usize;
    match version {
        1 => c.skip(6)?,
        2 => {}
        v => {
            return Err(FormatError::UnsupportedVersion {
                what: "filter pipeline",
                version: v,
            })
        }
    }

    let mut filters = Vec::with_capacity(count);
    for _ in 0..count {
        let id = c.u16()?;
        let name_len = if version == 1 || id >= 256 { c.u16()? as usize } else { 0 };
        let flags = c.u16()?;
        let nvalues = c.u16()? as usize;
        if name_len > 0 {
            let padded = if version == 1 { name_len.div_ceil(8) * 8 } else { name_len };
            c.skip(padded)?;
        }
        let client_data = (0..nvalues).map(|_| c.u32()).collect::<Result<Vec<_>, _>>()?;
        if version == 1 && nvalues % 2 == 1 {
            c.skip(4)?;
        }
        filters.push(FilterSpec {
            id,
            optional: flags & FLAG_OPTIONAL != 0,
            client_data,
        });
    }
    Ok(filters)
}

/// Encode `filters` as a version 2 message. Filters with ids >= 256 carry
/// the name returned by `name_of`.
pub fn serialize_pipeline(filters: &[FilterSpec], name_of: impl Fn(u16) -> Option<String>) -> Vec<u8> {
    let mut buf = vec![2, filters.len() as u8];
    for f in filters {
        buf.put_u16(f.id);
        let name = (f.id >= 256).then(|| {
            let mut n = name_of(f.id).unwrap_or_default().into_bytes();
            n.push(0);
            n
        });
        if let Some(name) = &name {
            buf.put_u16(name.len() as u16);
        }
        buf.put_u16(if f.optional { FLAG_OPTIONAL } else { 0 });
        buf.put_u16(f.client_data.len() as u16);
        if let Some(name) = &name {
            buf.extend_from_slice(name);
        }
        for &v in &f.client_data {
            buf.put_u32(v);
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyconduit_filters::FILTER_ZFP;

    #[test]
    fn v2_round_trip() {
        let mut zfp = FilterSpec::new(FILTER_ZFP, vec![1, 2, 3]);
        zfp.optional = true;
        let filters = vec![FilterSpec::shuffle(8), FilterSpec::deflate(5), zfp];
        let bytes = serialize_pipeline(&filters, |_| Some("zfp".into()));
        assert_eq!(parse_pipeline(&bytes).unwrap(), filters);
    }

    #[test]
    fn v1_with_names_and_odd_client_data() {
        let mut msg = vec![1, 1, 0, 0, 0, 0, 0, 0];
        msg.extend_from_slice(&1u16.to_le_bytes());
        msg.extend_from_slice(&8u16.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&1u16.to_le_bytes());
        msg.extend_from_slice(b"deflate\0");
        msg.extend_from_slice(&6u32.to_le_bytes());
        msg.extend_from_slice(&[0; 4]);
        assert_eq!(parse_pipeline(&msg).unwrap(), vec![FilterSpec::deflate(6)]);
    }
}
