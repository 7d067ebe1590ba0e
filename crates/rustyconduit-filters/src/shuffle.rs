use crate::{ChunkCodec, FilterError, FilterSpec};

/// Byte shuffle (HDF5 filter 2): byte 0 of every element, then byte 1, ...
pub struct Shuffle;

fn element_size_of(spec: &FilterSpec, fallback: usize) -> usize {
    spec.client_data
        .first()
        .map(|&s| s as usize)
        .filter(|&s| s > 0)
        .unwrap_or(fallback)
}

fn check(len: usize, element_size: usize) -> Result<usize, FilterError> {
    if len % element_size != 0 {
        return Err(FilterError::Misaligned { len, element_size });
    }
    Ok(len / element_size)
}

impl ChunkCodec for Shuffle {
    fn name(&self) -> &str {
        "shuffle"
    }

    fn encode(&self, data: &[u8], spec: &FilterSpec, esize: usize) -> Result<Vec<u8>, FilterError> {
        let size = element_size_of(spec, esize);
        if size <= 1 {
            return Ok(data.to_vec());
        }
        let count = check(data.len(), size)?;
        let mut out = vec![0u8; data.len()];
        for (i, element) in data.chunks_exact(size).enumerate() {
            for (j, &byte) in element.iter().enumerate() {
                out[j * count + i] = byte;
            }
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8], spec: &FilterSpec, esize: usize) -> Result<Vec<u8>, FilterError> {
        let size = element_size_of(spec, esize);
        if size <= 1 {
            return Ok(data.to_vec());
        }
        let count = check(data.len(), size)?;
        let mut out = vec![0u8; data.len()];
        for (i, element) in out.chunks_exact_mut(size).enumerate() {
            for (j, byte) in element.iter_mut().enumerate() {
                *byte = data[j * count + i];
            }
        }
        Ok(out)
    }
}
