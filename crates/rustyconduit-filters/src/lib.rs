//! Chunk codecs for rustyconduit HDF5 stores.
//!
//! Every codec implements [`ChunkCodec`] and is keyed by its HDF5 filter id.
//! A [`CodecRegistry`] starts with the built-in lossless codecs (deflate,
//! shuffle, fletcher32) and accepts additional codecs from the host, which is
//! how a floating-point codec such as ZFP (filter id 32013) is plugged in.
//!
//! Filters run forward (in pipeline order) when a chunk is written and in
//! reverse when it is read back.

mod deflate;
mod error;
mod fletcher;
mod shuffle;

use std::collections::BTreeMap;
use std::fmt;

pub use deflate::Deflate;
pub use error::FilterError;
pub use fletcher::{fletcher32, Fletcher32};
pub use shuffle::Shuffle;

/// HDF5 filter id of the zlib deflate filter.
pub const FILTER_DEFLATE: u16 = 1;
/// HDF5 filter id of the byte shuffle filter.
pub const FILTER_SHUFFLE: u16 = 2;
/// HDF5 filter id of the Fletcher-32 checksum filter.
pub const FILTER_FLETCHER32: u16 = 3;
/// Registered HDF5 filter id of the ZFP floating-point codec.
pub const FILTER_ZFP: u16 = 32013;

/// One filter as it appears in a dataset's filter pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub id: u16,
    /// Optional filters may be skipped by readers that do not know them.
    pub optional: bool,
    pub client_data: Vec<u32>,
}

impl FilterSpec {
    pub fn new(id: u16, client_data: Vec<u32>) -> Self {
        Self {
            id,
            optional: false,
            client_data,
        }
    }

    pub fn deflate(level: u32) -> Self {
        Self::new(FILTER_DEFLATE, vec![level.min(9)])
    }

    pub fn shuffle(element_size: usize) -> Self {
        Self::new(FILTER_SHUFFLE, vec![element_size as u32])
    }
}

/// A reversible transformation applied to one chunk of raw dataset bytes.
pub trait ChunkCodec {
    /// Short name used in diagnostics and in the pipeline's filter name field.
    fn name(&self) -> &str;

    /// Transform raw element bytes into their stored form.
    fn encode(&self, data: &[u8], spec: &FilterSpec, element_size: usize)
        -> Result<Vec<u8>, FilterError>;

    /// Undo [`ChunkCodec::encode`].
    fn decode(&self, data: &[u8], spec: &FilterSpec, element_size: usize)
        -> Result<Vec<u8>, FilterError>;
}

/// Filter-id keyed set of codecs.
pub struct CodecRegistry {
    codecs: BTreeMap<u16, Box<dyn ChunkCodec>>,
}

impl CodecRegistry {
    /// Registry holding only the built-in lossless codecs.
    pub fn new() -> Self {
        let mut codecs: BTreeMap<u16, Box<dyn ChunkCodec>> = BTreeMap::new();
        codecs.insert(FILTER_DEFLATE, Box::new(Deflate));
        codecs.insert(FILTER_SHUFFLE, Box::new(Shuffle));
        codecs.insert(FILTER_FLETCHER32, Box::new(Fletcher32));
        Self { codecs }
    }

    /// Register (or replace) the codec for `id`.
    pub fn register(&mut self, id: u16, codec: Box<dyn ChunkCodec>) {
        self.codecs.insert(id, codec);
    }

    pub fn contains(&self, id: u16) -> bool {
        self.codecs.contains_key(&id)
    }

    pub fn name_of(&self, id: u16) -> Option<&str> {
        self.codecs.get(&id).map(|c| c.name())
    }

    /// Run `pipeline` forward over one chunk.
    pub fn encode_chunk(
        &self,
        data: &[u8],
        pipeline: &[FilterSpec],
        element_size: usize,
    ) -> Result<Vec<u8>, FilterError> {
        let mut buf = data.to_vec();
        for spec in pipeline {
            let codec = self
                .codecs
                .get(&spec.id)
                .ok_or(FilterError::UnknownFilter(spec.id))?;
            buf = codec.encode(&buf, spec, element_size)?;
        }
        Ok(buf)
    }

    /// Run `pipeline` in reverse over one stored chunk.
    ///
    /// `filter_mask` bit `i` set means filter `i` was skipped when the chunk
    /// was written.
    pub fn decode_chunk(
        &self,
        stored: &[u8],
        pipeline: &[FilterSpec],
        filter_mask: u32,
        element_size: usize,
    ) -> Result<Vec<u8>, FilterError> {
        let mut buf = stored.to_vec();
        for (i, spec) in pipeline.iter().enumerate().rev() {
            if i < 32 && filter_mask & (1 << i) != 0 {
                continue;
            }
            match self.codecs.get(&spec.id) {
                Some(codec) => buf = codec.decode(&buf, spec, element_size)?,
                None if spec.optional => {}
                None => return Err(FilterError::UnknownFilter(spec.id)),
            }
        }
        Ok(buf)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.codecs.iter().map(|(id, c)| (id, c.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reverse;

    impl ChunkCodec for Reverse {
        fn name(&self) -> &str {
            "reverse"
        }

        fn encode(&self, data: &[u8], _: &FilterSpec, _: usize) -> Result<Vec<u8>, FilterError> {
            Ok(data.iter().rev().copied().collect())
        }

        fn decode(&self, data: &[u8], _: &FilterSpec, _: usize) -> Result<Vec<u8>, FilterError> {
            Ok(data.iter().rev().copied().collect())
        }
    }

    fn sample(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn shuffle_then_deflate_pipeline() {
        let reg = CodecRegistry::new();
        let pipeline = vec![FilterSpec::shuffle(4), FilterSpec::deflate(5)];
        let data = sample(4096);
        let stored = reg.encode_chunk(&data, &pipeline, 4).unwrap();
        assert_ne!(stored, data);
        let back = reg.decode_chunk(&stored, &pipeline, 0, 4).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn filter_mask_skips_filters() {
        let reg = CodecRegistry::new();
        let pipeline = vec![FilterSpec::shuffle(2), FilterSpec::deflate(1)];
        let data = sample(64);
        // chunk was stored with only the shuffle applied
        let stored = reg.encode_chunk(&data, &pipeline[..1], 2).unwrap();
        let back = reg.decode_chunk(&stored, &pipeline, 0b10, 2).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn unknown_filter_is_an_error() {
        let reg = CodecRegistry::new();
        let pipeline = vec![FilterSpec::new(FILTER_ZFP, vec![])];
        let err = reg.encode_chunk(&[1, 2, 3], &pipeline, 1).unwrap_err();
        assert_eq!(err, FilterError::UnknownFilter(FILTER_ZFP));
    }

    #[test]
    fn optional_unknown_filter_is_skipped_on_read() {
        let reg = CodecRegistry::new();
        let mut spec = FilterSpec::new(400, vec![]);
        spec.optional = true;
        let back = reg.decode_chunk(&[9, 8, 7], &[spec], 0, 1).unwrap();
        assert_eq!(back, vec![9, 8, 7]);
    }

    #[test]
    fn host_codec_registration() {
        let mut reg = CodecRegistry::new();
        assert!(!reg.contains(FILTER_ZFP));
        reg.register(FILTER_ZFP, Box::new(Reverse));
        assert_eq!(reg.name_of(FILTER_ZFP), Some("reverse"));
        let pipeline = vec![FilterSpec::new(FILTER_ZFP, vec![])];
        let stored = reg.encode_chunk(&[1, 2, 3], &pipeline, 1).unwrap();
        assert_eq!(stored, vec![3, 2, 1]);
        assert_eq!(reg.decode_chunk(&stored, &pipeline, 0, 1).unwrap(), vec![1, 2, 3]);
    }
}
