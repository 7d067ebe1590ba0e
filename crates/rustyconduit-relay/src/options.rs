//! Store-handle configuration: the dataset creation policy and open modes.

use rustyconduit::{Node, TypeId};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How new datasets are laid out.
///
/// Leaves smaller than the compact threshold are stored inside their
/// object header. Larger leaves are chunked (and compressed) when chunking
/// is on and they exceed the chunk threshold, or when the write that
/// creates them addresses an offset or stride. Everything else is a plain
/// contiguous dataset with a fixed extent.
///
/// ```
/// use rustyconduit_relay::{CompressionMethod, Hdf5Options};
///
/// let opts = Hdf5Options::default()
///     .with_compact_threshold(256)
///     .with_chunking(1 << 20, 1 << 16)
///     .with_gzip(9);
/// assert_eq!(opts.chunking.compression.method, CompressionMethod::Gzip);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Hdf5Options {
    pub compact_storage: CompactStorage,
    pub chunking: Chunking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactStorage {
    pub enabled: bool,
    /// Bytes.
    pub threshold: u64,
}

impl Default for CompactStorage {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chunking {
    pub enabled: bool,
    /// Leaves above this many bytes are chunked.
    pub threshold: u64,
    /// Target bytes per chunk.
    pub chunk_size: u64,
    pub compression: Compression,
}

impl Default for Chunking {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 2_000_000,
            chunk_size: 1_000_000,
            compression: Compression::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Gzip,
    Zfp,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZfpMode {
    Rate,
    Precision,
    Accuracy,
    Expert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compression {
    pub method: CompressionMethod,
    /// Gzip level, 0 to 9.
    pub level: u32,
    pub zfp_mode: ZfpMode,
    /// Bits per value in `rate` mode.
    pub rate: f64,
    /// Bit planes in `precision` mode.
    pub precision: u32,
    /// Absolute error bound in `accuracy` mode.
    pub accuracy: f64,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Gzip,
            level: 5,
            zfp_mode: ZfpMode::Rate,
            rate: 8.0,
            precision: 16,
            accuracy: 1e-6,
        }
    }
}

impl Hdf5Options {
    pub fn with_compact_threshold(mut self, bytes: u64) -> Self {
        self.compact_storage.enabled = true;
        self.compact_storage.threshold = bytes;
        self
    }

    pub fn without_compact_storage(mut self) -> Self {
        self.compact_storage.enabled = false;
        self
    }

    pub fn with_chunking(mut self, threshold: u64, chunk_size: u64) -> Self {
        self.chunking.enabled = true;
        self.chunking.threshold = threshold;
        self.chunking.chunk_size = chunk_size;
        self
    }

    pub fn without_chunking(mut self) -> Self {
        self.chunking.enabled = false;
        self
    }

    pub fn with_gzip(mut self, level: u32) -> Self {
        self.chunking.compression.method = CompressionMethod::Gzip;
        self.chunking.compression.level = level.min(9);
        self
    }

    /// Compress floating-point chunks with ZFP. The codec itself must be
    /// registered with the file's codec registry.
    pub fn with_zfp(mut self, mode: ZfpMode) -> Self {
        self.chunking.compression.method = CompressionMethod::Zfp;
        self.chunking.compression.zfp_mode = mode;
        self
    }

    pub fn without_compression(mut self) -> Self {
        self.chunking.compression.method = CompressionMethod::None;
        self
    }

    /// Read options from a node tree using the `compact_storage/...` and
    /// `chunking/...` vocabulary. Missing entries keep their defaults.
    pub fn from_node(node: &Node) -> Result<Hdf5Options> {
        let mut opts = Hdf5Options::default();
        if let Some(v) = entry(node, "compact_storage/enabled") {
            opts.compact_storage.enabled = flag(v, "compact_storage/enabled")?;
        }
        if let Some(v) = entry(node, "compact_storage/threshold") {
            opts.compact_storage.threshold = count(v, "compact_storage/threshold")?;
        }
        if let Some(v) = entry(node, "chunking/enabled") {
            opts.chunking.enabled = flag(v, "chunking/enabled")?;
        }
        if let Some(v) = entry(node, "chunking/threshold") {
            opts.chunking.threshold = count(v, "chunking/threshold")?;
        }
        if let Some(v) = entry(node, "chunking/chunk_size") {
            opts.chunking.chunk_size = count(v, "chunking/chunk_size")?;
        }
        let c = &mut opts.chunking.compression;
        if let Some(v) = entry(node, "chunking/compression/method") {
            c.method = match v.as_string()?.as_str() {
                "gzip" => CompressionMethod::Gzip,
                "zfp" => CompressionMethod::Zfp,
                "none" => CompressionMethod::None,
                other => return Err(Error::Usage(format!("unknown compression method {other:?}"))),
            };
        }
        if let Some(v) = entry(node, "chunking/compression/level") {
            c.level = count(v, "chunking/compression/level")?.min(9) as u32;
        }
        if let Some(v) = entry(node, "chunking/compression/zfp_mode") {
            c.zfp_mode = match v.as_string()?.as_str() {
                "rate" => ZfpMode::Rate,
                "precision" => ZfpMode::Precision,
                "accuracy" => ZfpMode::Accuracy,
                "expert" => ZfpMode::Expert,
                other => return Err(Error::Usage(format!("unknown zfp mode {other:?}"))),
            };
        }
        if let Some(v) = entry(node, "chunking/compression/rate") {
            c.rate = v.to_f64()?;
        }
        if let Some(v) = entry(node, "chunking/compression/precision") {
            c.precision = count(v, "chunking/compression/precision")? as u32;
        }
        if let Some(v) = entry(node, "chunking/compression/accuracy") {
            c.accuracy = v.to_f64()?;
        }
        Ok(opts)
    }

    /// The options as a node tree, readable by [`Hdf5Options::from_node`].
    pub fn to_node(&self) -> Node {
        let mut n = Node::new();
        n.fetch("compact_storage/enabled").set_string(on_off(self.compact_storage.enabled));
        n.fetch("compact_storage/threshold").set(self.compact_storage.threshold);
        n.fetch("chunking/enabled").set_string(on_off(self.chunking.enabled));
        n.fetch("chunking/threshold").set(self.chunking.threshold);
        n.fetch("chunking/chunk_size").set(self.chunking.chunk_size);
        let c = &self.chunking.compression;
        let method = match c.method {
            CompressionMethod::Gzip => "gzip",
            CompressionMethod::Zfp => "zfp",
            CompressionMethod::None => "none",
        };
        n.fetch("chunking/compression/method").set_string(method);
        n.fetch("chunking/compression/level").set(u64::from(c.level));
        let mode = match c.zfp_mode {
            ZfpMode::Rate => "rate",
            ZfpMode::Precision => "precision",
            ZfpMode::Accuracy => "accuracy",
            ZfpMode::Expert => "expert",
        };
        n.fetch("chunking/compression/zfp_mode").set_string(mode);
        n.fetch("chunking/compression/rate").set(c.rate);
        n.fetch("chunking/compression/precision").set(u64::from(c.precision));
        n.fetch("chunking/compression/accuracy").set(c.accuracy);
        n
    }
}

fn entry<'n>(node: &'n Node, path: &str) -> Option<&'n Node> {
    node.fetch_existing(path).ok().filter(|n| n.is_leaf())
}

fn on_off(on: bool) -> &'static str {
    if on {
        "true"
    } else {
        "false"
    }
}

/// `"true"` / `"false"` strings or any number (nonzero is on).
fn flag(node: &Node, name: &str) -> Result<bool> {
    if node.dtype().id() == TypeId::Char8Str {
        return match node.as_string()?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(Error::Usage(format!("{name}: expected true or false, got {other:?}"))),
        };
    }
    Ok(node.to_f64()? != 0.0)
}

fn count(node: &Node, name: &str) -> Result<u64> {
    let v = node.to_i64()?;
    u64::try_from(v).map_err(|_| Error::Usage(format!("{name} must not be negative, got {v}")))
}

/// How [`Hdf5File::open`](crate::Hdf5File::open) treats the file.
///
/// Parsed from the letters `r`, `w`, `a` and `t`: `r` alone is read-only,
/// `w` allows writes, `a` opens an existing file (the default) and `t`
/// truncates it. `a` and `t` exclude each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub write: bool,
    pub truncate: bool,
}

impl OpenMode {
    pub const READ: OpenMode = OpenMode {
        write: false,
        truncate: false,
    };
    pub const APPEND: OpenMode = OpenMode {
        write: true,
        truncate: false,
    };
    pub const TRUNCATE: OpenMode = OpenMode {
        write: true,
        truncate: true,
    };

    pub fn parse(mode: &str) -> Result<OpenMode> {
        let (mut read, mut write, mut append, mut truncate) = (false, false, false, false);
        for c in mode.chars() {
            match c {
                'r' => read = true,
                'w' => write = true,
                'a' => append = true,
                't' => truncate = true,
                other => return Err(Error::Usage(format!("open mode {mode:?}: unknown flag {other:?}"))),
            }
        }
        if append && truncate {
            return Err(Error::Usage(format!(
                "open mode {mode:?}: append and truncate exclude each other"
            )));
        }
        if !read && !write && !append && !truncate {
            return Err(Error::Usage("empty open mode".into()));
        }
        Ok(OpenMode {
            write: write || append || truncate || !read,
            truncate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_modes() {
        assert_eq!(OpenMode::parse("r").unwrap(), OpenMode::READ);
        assert_eq!(OpenMode::parse("rw").unwrap(), OpenMode::APPEND);
        assert_eq!(OpenMode::parse("wa").unwrap(), OpenMode::APPEND);
        assert_eq!(OpenMode::parse("wt").unwrap(), OpenMode::TRUNCATE);
        assert!(matches!(OpenMode::parse("at"), Err(Error::Usage(_))));
        assert!(matches!(OpenMode::parse("rx"), Err(Error::Usage(_))));
    }

    #[test]
    fn options_round_trip_through_nodes() {
        let opts = Hdf5Options::default()
            .without_compact_storage()
            .with_chunking(10, 4)
            .with_zfp(ZfpMode::Accuracy);
        let back = Hdf5Options::from_node(&opts.to_node()).unwrap();
        assert_eq!(back, opts);
    }

    #[test]
    fn partial_option_trees_keep_defaults() {
        let mut n = Node::new();
        n.fetch("chunking/compression/method").set_string("none");
        n.fetch("compact_storage/enabled").set(0i32);
        let opts = Hdf5Options::from_node(&n).unwrap();
        assert!(!opts.compact_storage.enabled);
        assert_eq!(opts.chunking.compression.method, CompressionMethod::None);
        assert_eq!(opts.chunking, Chunking {
            compression: opts.chunking.compression.clone(),
            ..Chunking::default()
        });

        n.fetch("chunking/compression/method").set_string("lz4");
        assert!(matches!(Hdf5Options::from_node(&n), Err(Error::Usage(_))));
    }
}
