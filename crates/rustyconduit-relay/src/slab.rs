//! Partial read/write windows (`offset`, `stride`, `size` per dimension).

use rustyconduit::Node;
use rustyconduit_format::Hyperslab;

use crate::error::{Error, Result};

/// Caller-side slab options. Any field may be missing; a single value
/// applies to every dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlabOptions {
    pub offsets: Option<Vec<u64>>,
    pub strides: Option<Vec<u64>>,
    pub sizes: Option<Vec<u64>>,
    /// Resolve the window but transfer nothing.
    pub metadata_only: bool,
}

impl SlabOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offsets = Some(vec![offset]);
        self
    }

    pub fn stride(mut self, stride: u64) -> Self {
        self.strides = Some(vec![stride]);
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.sizes = Some(vec![size]);
        self
    }

    pub fn offsets(mut self, offsets: Vec<u64>) -> Self {
        self.offsets = Some(offsets);
        self
    }

    pub fn strides(mut self, strides: Vec<u64>) -> Self {
        self.strides = Some(strides);
        self
    }

    pub fn sizes(mut self, sizes: Vec<u64>) -> Self {
        self.sizes = Some(sizes);
        self
    }

    pub fn metadata_only(mut self) -> Self {
        self.metadata_only = true;
        self
    }

    /// True when the options address anything but the whole dataset from
    /// its start.
    pub fn is_slab(&self) -> bool {
        let nontrivial = |v: &Option<Vec<u64>>, default: u64| {
            v.as_ref().is_some_and(|v| v.iter().any(|&x| x != default))
        };
        nontrivial(&self.offsets, 0) || nontrivial(&self.strides, 1)
    }

    /// Read `offset`/`offsets`, `stride`/`strides`, `size`/`sizes` and
    /// `metadata_only` from an options tree.
    pub fn from_node(node: &Node) -> Result<SlabOptions> {
        Ok(SlabOptions {
            offsets: dims(node, "offset", "offsets")?,
            strides: dims(node, "stride", "strides")?,
            sizes: dims(node, "size", "sizes")?,
            metadata_only: match node.fetch_existing("metadata_only") {
                Ok(v) if v.is_string() => v.as_string()? == "true",
                Ok(v) if v.is_number() => v.to_i64()? != 0,
                _ => false,
            },
        })
    }

    /// One-dimensional offset and stride for writes; stride 0 is refused.
    pub(crate) fn write_window(&self) -> Result<(u64, u64)> {
        let offset = first(&self.offsets, "offset")?.unwrap_or(0);
        let stride = first(&self.strides, "stride")?.unwrap_or(1);
        if stride == 0 {
            return Err(Error::Usage("stride must be at least 1".into()));
        }
        Ok((offset, stride))
    }
}

fn dims(node: &Node, one: &str, many: &str) -> Result<Option<Vec<u64>>> {
    let found = node.fetch_existing(many).or_else(|_| node.fetch_existing(one));
    let Ok(v) = found else { return Ok(None) };
    if !v.is_number() {
        return Err(Error::Usage(format!("{one} must be numeric")));
    }
    v.to_i64_vec()?
        .into_iter()
        .map(|x| u64::try_from(x).map_err(|_| Error::Usage(format!("{one} must not be negative, got {x}"))))
        .collect::<Result<Vec<u64>>>()
        .map(Some)
}

fn first(v: &Option<Vec<u64>>, name: &str) -> Result<Option<u64>> {
    match v.as_deref() {
        None | Some([]) => Ok(None),
        Some([x]) => Ok(Some(*x)),
        Some(many) => Err(Error::Usage(format!(
            "{name}: writes are one-dimensional, got {} values",
            many.len()
        ))),
    }
}

/// Fully resolved window over a dataset of known shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlabParams {
    pub rank: usize,
    pub dataset_sizes: Vec<u64>,
    pub offsets: Vec<u64>,
    pub strides: Vec<u64>,
    pub sizes: Vec<u64>,
    /// Elements the window touches.
    pub readcount: u64,
}

impl SlabParams {
    /// Resolve `opts` against a dataset of shape `dims`; scalars count as
    /// one dimension of one element.
    ///
    /// Missing offsets are 0, missing strides 1 and missing sizes cover
    /// every remaining element. A window that leaves the dataset is
    /// `OutOfRange`; a zero stride is a `Usage` error.
    pub fn resolve(opts: &SlabOptions, dims: &[u64]) -> Result<SlabParams> {
        let dataset_sizes: Vec<u64> = if dims.is_empty() { vec![1] } else { dims.to_vec() };
        let rank = dataset_sizes.len();
        let offsets = per_dim(&opts.offsets, rank, 0, "offset")?;
        let strides = per_dim(&opts.strides, rank, 1, "stride")?;
        if let Some(d) = strides.iter().position(|&s| s == 0) {
            return Err(Error::Usage(format!("stride must be at least 1 (dimension {d})")));
        }
        for d in 0..rank {
            if offsets[d] > dataset_sizes[d] || (offsets[d] == dataset_sizes[d] && dataset_sizes[d] > 0) {
                return Err(Error::OutOfRange(format!(
                    "offset {} beyond extent {} in dimension {d}",
                    offsets[d], dataset_sizes[d]
                )));
            }
        }
        let remaining: Vec<u64> = (0..rank)
            .map(|d| (dataset_sizes[d] - offsets[d]).div_ceil(strides[d]))
            .collect();
        let sizes = match &opts.sizes {
            None => remaining.clone(),
            Some(_) => per_dim(&opts.sizes, rank, 0, "size")?,
        };
        for d in 0..rank {
            if sizes[d] > remaining[d] {
                return Err(Error::OutOfRange(format!(
                    "{} elements at offset {} stride {} exceed extent {} in dimension {d}",
                    sizes[d], offsets[d], strides[d], dataset_sizes[d]
                )));
            }
        }
        let readcount = sizes.iter().product();
        Ok(SlabParams {
            rank,
            dataset_sizes,
            offsets,
            strides,
            sizes,
            readcount,
        })
    }

    pub fn hyperslab(&self) -> Hyperslab {
        Hyperslab {
            start: self.offsets.clone(),
            stride: self.strides.clone(),
            count: self.sizes.clone(),
        }
    }

    /// True when the window is the whole dataset.
    pub fn is_whole(&self) -> bool {
        self.sizes == self.dataset_sizes
    }
}

fn per_dim(v: &Option<Vec<u64>>, rank: usize, default: u64, name: &str) -> Result<Vec<u64>> {
    match v.as_deref() {
        None | Some([]) => Ok(vec![default; rank]),
        Some([x]) => Ok(vec![*x; rank]),
        Some(many) if many.len() == rank => Ok(many.to_vec()),
        Some(many) => Err(Error::Usage(format!(
            "{name}: {} values for a rank {rank} dataset",
            many.len()
        ))),
    }
}
