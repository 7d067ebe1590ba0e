use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::{ChunkCodec, FilterError, FilterSpec};

/// zlib deflate (HDF5 filter 1). Client data word 0 is the level.
pub struct Deflate;

impl Deflate {
    pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, FilterError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
        encoder
            .write_all(data)
            .map_err(|e| FilterError::Deflate(e.to_string()))?;
        encoder.finish().map_err(|e| FilterError::Deflate(e.to_string()))
    }

    pub fn decompress(data: &[u8]) -> Result<Vec<u8>, FilterError> {
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| FilterError::Deflate(e.to_string()))?;
        Ok(out)
    }
}

impl ChunkCodec for Deflate {
    fn name(&self) -> &str {
        "deflate"
    }

    fn encode(&self, data: &[u8], spec: &FilterSpec, _: usize) -> Result<Vec<u8>, FilterError> {
        let level = spec.client_data.first().copied().unwrap_or(6);
        Self::compress(data, level)
    }

    fn decode(&self, data: &[u8], _: &FilterSpec, _: usize) -> Result<Vec<u8>, FilterError> {
        Self::decompress(data)
    }
}
