use byteorder::{ByteOrder, LittleEndian};

use crate::{ChunkCodec, FilterError, FilterSpec};

/// Fletcher-32 over 16-bit big-endian words, odd trailing byte padded.
pub fn fletcher32(data: &[u8]) -> u32 {
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    for block in data.chunks(360 * 2) {
        for word in block.chunks(2) {
            let w = match *word {
                [hi, lo] => (u32::from(hi) << 8) | u32::from(lo),
                [hi] => u32::from(hi) << 8,
                _ => 0,
            };
            sum1 += w;
            sum2 += sum1;
        }
        sum1 = (sum1 & 0xffff) + (sum1 >> 16);
        sum2 = (sum2 & 0xffff) + (sum2 >> 16);
    }
    sum1 = (sum1 & 0xffff) + (sum1 >> 16);
    sum2 = (sum2 & 0xffff) + (sum2 >> 16);
    (sum2 << 16) | sum1
}

/// Fletcher-32 checksum filter (HDF5 filter 3): appends four bytes.
pub struct Fletcher32;

impl ChunkCodec for Fletcher32 {
    fn name(&self) -> &str {
        "fletcher32"
    }

    fn encode(&self, data: &[u8], _: &FilterSpec, _: usize) -> Result<Vec<u8>, FilterError> {
        let mut out = Vec::with_capacity(data.len() + 4);
        out.extend_from_slice(data);
        let mut sum = [0u8; 4];
        LittleEndian::write_u32(&mut sum, fletcher32(data));
        out.extend_from_slice(&sum);
        Ok(out)
    }

    fn decode(&self, data: &[u8], _: &FilterSpec, _: usize) -> Result<Vec<u8>, FilterError> {
        if data.len() < 4 {
            return Err(FilterError::Codec("fletcher32: chunk shorter than checksum".into()));
        }
        let (body, tail) = data.split_at(data.len() - 4);
        let stored = LittleEndian::read_u32(tail);
        let computed = fletcher32(body);
        if stored != computed {
            return Err(FilterError::ChecksumMismatch { stored, computed });
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_detected() {
        let spec = FilterSpec::new(crate::FILTER_FLETCHER32, vec![]);
        let mut stored = Fletcher32.encode(b"hello world", &spec, 1).unwrap();
        assert_eq!(stored.len(), 15);
        assert_eq!(Fletcher32.decode(&stored, &spec, 1).unwrap(), b"hello world");
        stored[0] ^= 0xff;
        assert!(matches!(
            Fletcher32.decode(&stored, &spec, 1),
            Err(FilterError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn odd_length_input() {
        assert_ne!(fletcher32(b"abc"), fletcher32(b"ab"));
        assert_eq!(fletcher32(&[]), 0);
    }
}
