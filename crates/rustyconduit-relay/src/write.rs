//! Node trees into the store.
//!
//! Every write is checked against the existing objects first and aborted
//! as a whole when anything conflicts, so a failed write leaves the store
//! untouched. Objects become groups, lists become groups carrying the list
//! marker with children named by position, and leaves become datasets laid
//! out by the file's [`Hdf5Options`](crate::Hdf5Options).

use rustyconduit::{DataType, Node, TypeId};
use rustyconduit_filters::{FilterSpec, FILTER_ZFP};
use rustyconduit_format::{
    Attribute, Dataset, Dataspace, Datatype, Group, Hyperslab, Object, ObjectId, StorageLayout,
};
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::mapping::{byte_order, datatype_for, swap_elements, LIST_MARKER};
use crate::options::{CompressionMethod, ZfpMode};
use crate::path::{display, join, normalize};
use crate::slab::SlabOptions;
use crate::store::{split_last, DatasetHandle, Hdf5File};

impl Hdf5File {
    /// Write `node` at `path`, creating groups along the way.
    pub fn write(&mut self, node: &Node, path: &str) -> Result<()> {
        self.write_with_options(node, path, &SlabOptions::new())
    }

    /// Write `node` at `path`; every leaf is written at the offset and
    /// stride in `opts`.
    pub fn write_with_options(&mut self, node: &Node, path: &str, opts: &SlabOptions) -> Result<()> {
        self.require_write()?;
        opts.write_window()?;
        let path = normalize(path);
        debug!(file = %self.file_name(), path = %display(&path), slab = opts.is_slab(), "writing tree");
        if let Some(why) = self.check_compatible(node, &path, opts.is_slab()) {
            return Err(Error::IncompatibleTree(why));
        }
        if opts.is_slab() {
            self.check_windows(node, &path, opts)?;
        }
        let (parent, name) = match split_last(&path) {
            Some((parent, name)) => (self.ensure_groups(parent)?, name),
            None => {
                let root = self.image.root();
                return self.write_children(node, root, &path, opts);
            }
        };
        let existing = self.image.group(parent).and_then(|g| g.link(name)).map(|l| l.target);
        self.write_node(node, parent, name, existing, &path, opts)?;
        Ok(())
    }

    /// Write one leaf into an existing dataset and return the handle to use
    /// from now on. A fixed dataset written at an offset or stride is
    /// recreated as an extendible one, which invalidates `handle`.
    pub fn write_leaf_to_dataset(
        &mut self,
        node: &Node,
        handle: &DatasetHandle,
        opts: &SlabOptions,
    ) -> Result<DatasetHandle> {
        self.require_write()?;
        opts.write_window()?;
        self.check_handle(handle)?;
        if !node.is_leaf() && !node.is_empty() {
            return Err(Error::Usage(format!(
                "{}:{}: only leaves can be written to a dataset",
                self.file_name(),
                display(&handle.path)
            )));
        }
        if let Some(why) = self.check_compatible(node, &handle.path, opts.is_slab()) {
            return Err(Error::IncompatibleTree(why));
        }
        let Some((parent_path, name)) = split_last(&handle.path) else {
            return Err(Error::Usage("the root is not a dataset".into()));
        };
        let parent = self.group(parent_path)?.id;
        let id = self.write_leaf_into(node, parent, name, handle.id, &handle.path, opts)?;
        Ok(DatasetHandle {
            id,
            path: handle.path.clone(),
        })
    }

    /// Groups for every segment of `path`, created where missing.
    fn ensure_groups(&mut self, path: &str) -> Result<ObjectId> {
        let mut at = self.image.root();
        let mut walked = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            walked = join(&walked, part);
            let existing = self.image.group(at).and_then(|g| g.link(part)).map(|l| l.target);
            at = match existing {
                Some(id) if self.image.group(id).is_some() => id,
                Some(_) => return Err(self.wrong_kind(&walked, "group", "dataset")),
                None => self.add(at, part, Object::Group(Group::new()), &walked)?,
            };
        }
        Ok(at)
    }

    fn add(&mut self, parent: ObjectId, name: &str, object: Object, path: &str) -> Result<ObjectId> {
        trace!(path = %display(path), kind = object.kind(), "creating object");
        self.image
            .add_child(parent, name, object)
            .map_err(|e| self.format_error(e))
    }

    fn write_node(
        &mut self,
        node: &Node,
        parent: ObjectId,
        name: &str,
        existing: Option<ObjectId>,
        path: &str,
        opts: &SlabOptions,
    ) -> Result<ObjectId> {
        if node.is_object() || node.is_list() {
            let group = match existing {
                Some(id) => id,
                None => self.add(parent, name, Object::Group(Group::new()), path)?,
            };
            self.write_children(node, group, path, opts)?;
            return Ok(group);
        }
        match existing {
            Some(id) => self.write_leaf_into(node, parent, name, id, path, opts),
            None => {
                let dataset = self.new_dataset(node, opts, path)?;
                self.add(parent, name, Object::Dataset(dataset), path)
            }
        }
    }

    fn write_children(&mut self, node: &Node, group: ObjectId, path: &str, opts: &SlabOptions) -> Result<()> {
        if let Some(g) = self.image.group_mut(group) {
            let marked = g.attribute(LIST_MARKER).is_some();
            if node.is_list() && !marked {
                g.set_attribute(Attribute::scalar_i32(LIST_MARKER, 1));
            } else if node.is_object() && marked {
                g.attributes.retain(|a| a.name != LIST_MARKER);
            }
        }
        if node.is_list() {
            let existing: Vec<(String, ObjectId)> = self
                .image
                .group(group)
                .map(|g| g.links().into_iter().map(|l| (l.name.clone(), l.target)).collect())
                .unwrap_or_default();
            for (i, child) in node.children().enumerate() {
                let (name, target) = match existing.get(i) {
                    Some((name, target)) => (name.clone(), Some(*target)),
                    None => (i.to_string(), None),
                };
                let child_path = join(path, &name);
                self.write_node(child, group, &name, target, &child_path, opts)?;
            }
        } else {
            for (name, child) in node.entries() {
                let existing = self.image.group(group).and_then(|g| g.link(name)).map(|l| l.target);
                self.write_node(child, group, name, existing, &join(path, name), opts)?;
            }
        }
        Ok(())
    }

    /// A fresh dataset for `node` laid out by the creation policy.
    fn new_dataset(&self, node: &Node, opts: &SlabOptions, path: &str) -> Result<Dataset> {
        let dtype = node.dtype();
        let datatype = datatype_for(&dtype);
        if node.is_empty() {
            return Dataset::new(datatype, Dataspace::Null, StorageLayout::Compact, Vec::new())
                .map_err(|e| self.format_error(e));
        }
        let data = node.leaf_compact_bytes()?;
        if dtype.id() == TypeId::Char8Str {
            let layout = self.small_or_contiguous(data.len() as u64);
            return Dataset::new(datatype, Dataspace::Scalar, layout, data).map_err(|e| self.format_error(e));
        }

        let n = dtype.number_of_elements();
        let bytes = data.len() as u64;
        let policy = &self.options;
        if opts.is_slab() {
            let (offset, stride) = opts.write_window()?;
            let extent = self.window_extent(offset, stride, n, path)?;
            let zeros = self.zeroed(extent, u64::from(datatype.size()), path)?;
            let mut ds = self.extendible(&dtype, datatype, extent, zeros)?;
            write_window(&mut ds, (offset, stride, n), extent, &data).map_err(|e| self.format_error(e))?;
            return Ok(ds);
        }
        if policy.compact_storage.enabled && bytes < policy.compact_storage.threshold {
            return Dataset::new(datatype, Dataspace::simple(vec![n]), StorageLayout::Compact, data)
                .map_err(|e| self.format_error(e));
        }
        if policy.chunking.enabled && bytes > policy.chunking.threshold {
            trace!(path = %display(path), bytes, "chunking large leaf");
            return self.extendible(&dtype, datatype, n, data);
        }
        Dataset::new(datatype, Dataspace::simple(vec![n]), StorageLayout::Contiguous, data)
            .map_err(|e| self.format_error(e))
    }

    fn small_or_contiguous(&self, bytes: u64) -> StorageLayout {
        let compact = &self.options.compact_storage;
        if compact.enabled && bytes < compact.threshold {
            StorageLayout::Compact
        } else {
            StorageLayout::Contiguous
        }
    }

    /// Chunked, unlimited, one-dimensional dataset holding `data`.
    fn extendible(&self, dtype: &DataType, datatype: Datatype, len: u64, data: Vec<u8>) -> Result<Dataset> {
        let esize = u64::from(datatype.size()).max(1);
        let chunk = (self.options.chunking.chunk_size / esize).clamp(1, len.max(1));
        let filters = self.filters_for(dtype)?;
        Ok(Dataset::new(
            datatype,
            Dataspace::extendible(len),
            StorageLayout::Chunked { chunk_dims: vec![chunk] },
            data,
        )
        .map_err(|e| self.format_error(e))?
        .with_filters(filters))
    }

    fn filters_for(&self, dtype: &DataType) -> Result<Vec<FilterSpec>> {
        let c = &self.options.chunking.compression;
        Ok(match c.method {
            CompressionMethod::None => Vec::new(),
            CompressionMethod::Gzip => vec![FilterSpec::deflate(c.level)],
            CompressionMethod::Zfp if !dtype.id().is_float() => Vec::new(),
            CompressionMethod::Zfp => {
                if !self.codecs.contains(FILTER_ZFP) {
                    return Err(Error::Usage(format!(
                        "{}: zfp compression requested but no codec is registered for filter {FILTER_ZFP}",
                        self.file_name()
                    )));
                }
                vec![FilterSpec::new(FILTER_ZFP, zfp_parameters(c.zfp_mode, c))]
            }
        })
    }

    /// Write `node` into the dataset `id` (linked as `name` in `parent`).
    /// Returns the dataset's id, which changes when it had to be recreated.
    fn write_leaf_into(
        &mut self,
        node: &Node,
        parent: ObjectId,
        name: &str,
        id: ObjectId,
        path: &str,
        opts: &SlabOptions,
    ) -> Result<ObjectId> {
        if node.is_empty() {
            return Ok(id);
        }
        let (offset, stride) = opts.write_window()?;
        let Some(ds) = self.image.dataset(id) else {
            return Err(self.wrong_kind(path, "dataset", "group"));
        };
        let dtype = node.dtype();
        let n = dtype.number_of_elements();

        if dtype.id() == TypeId::Char8Str {
            if opts.is_slab() {
                return Err(Error::Usage(format!(
                    "{}: strings cannot be written at an offset or stride",
                    display(path)
                )));
            }
            if matches!(ds.datatype, Datatype::VariableLength { .. }) {
                let fresh = self.new_dataset(node, opts, path)?;
                return self.replace(parent, name, fresh, path);
            }
            let data = node.leaf_compact_bytes()?;
            if let Err(e) = self.dataset_mut(id, path)?.overwrite(&data) {
                return Err(self.format_error(e));
            }
            return Ok(id);
        }

        let mut data = node.leaf_compact_bytes()?;
        if let Some(order) = ds.datatype.byte_order() {
            if order != byte_order(&dtype) {
                swap_elements(&mut data, dtype.element_bytes() as usize);
            }
        }

        if !opts.is_slab() {
            let extendible = ds.is_extendible();
            let stored = ds.dataspace.num_elements();
            if stored != n && !extendible {
                return Err(Error::IncompatibleTree(format!(
                    "{}:{}: {n} elements do not fit the fixed extent of {stored}",
                    self.file_name(),
                    display(path)
                )));
            }
            let ds = self.dataset_mut(id, path)?;
            let result = if stored == n {
                ds.overwrite(&data)
            } else {
                ds.set_extent(&[n]).and_then(|_| ds.overwrite(&data))
            };
            if let Err(e) = result {
                return Err(self.format_error(e));
            }
            return Ok(id);
        }

        let required = self.window_extent(offset, stride, n, path)?;
        self.extent_bytes(required, u64::from(ds.datatype.size()), path)?;
        let id = if ds.is_extendible() {
            id
        } else {
            self.promote(parent, name, id, &dtype, path)?
        };
        if let Err(e) = write_window(self.dataset_mut(id, path)?, (offset, stride, n), required, &data) {
            return Err(self.format_error(e));
        }
        Ok(id)
    }

    /// Every numeric leaf's window must be addressable before anything is
    /// written.
    fn check_windows(&self, node: &Node, path: &str, opts: &SlabOptions) -> Result<()> {
        if node.is_object() {
            for (name, child) in node.entries() {
                self.check_windows(child, &join(path, name), opts)?;
            }
        } else if node.is_list() {
            for (i, child) in node.children().enumerate() {
                self.check_windows(child, &join(path, &i.to_string()), opts)?;
            }
        } else if node.is_leaf() && node.dtype().id() != TypeId::Char8Str {
            let (offset, stride) = opts.write_window()?;
            let dtype = node.dtype();
            let extent = self.window_extent(offset, stride, dtype.number_of_elements(), path)?;
            self.extent_bytes(extent, dtype.element_bytes(), path)?;
        }
        Ok(())
    }

    /// Elements needed to hold `n` values at `offset` spaced by `stride`.
    fn window_extent(&self, offset: u64, stride: u64, n: u64, path: &str) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }
        (n - 1)
            .checked_mul(stride)
            .and_then(|span| span.checked_add(offset))
            .and_then(|last| last.checked_add(1))
            .ok_or_else(|| {
                Error::OutOfRange(format!(
                    "{}:{}: {n} elements at offset {offset} with stride {stride} exceed the addressable extent",
                    self.file_name(),
                    display(path)
                ))
            })
    }

    fn extent_too_large(&self, extent: u64, path: &str) -> Error {
        Error::OutOfRange(format!(
            "{}:{}: an extent of {extent} elements cannot be held in memory",
            self.file_name(),
            display(path)
        ))
    }

    /// Bytes for `extent` elements of `size` bytes, when addressable.
    fn extent_bytes(&self, extent: u64, size: u64, path: &str) -> Result<usize> {
        extent
            .checked_mul(size)
            .and_then(|b| usize::try_from(b).ok())
            .filter(|b| isize::try_from(*b).is_ok())
            .ok_or_else(|| self.extent_too_large(extent, path))
    }

    /// A zero buffer of `extent` elements of `size` bytes.
    fn zeroed(&self, extent: u64, size: u64, path: &str) -> Result<Vec<u8>> {
        let bytes = self.extent_bytes(extent, size, path)?;
        let mut zeros = Vec::new();
        zeros
            .try_reserve_exact(bytes)
            .map_err(|_| self.extent_too_large(extent, path))?;
        zeros.resize(bytes, 0);
        Ok(zeros)
    }

    /// Recreate a fixed dataset as an extendible one with the same
    /// contents.
    fn promote(&mut self, parent: ObjectId, name: &str, id: ObjectId, dtype: &DataType, path: &str) -> Result<ObjectId> {
        let Some(old) = self.image.dataset(id) else {
            return Err(self.not_found(path));
        };
        let contents = old.data().to_vec();
        let len = old.dataspace.num_elements();
        let datatype = old.datatype.clone();
        let attributes = old.attributes.clone();
        info!(
            file = %self.file_name(),
            path = %display(path),
            elements = len,
            "recreating fixed dataset as extendible"
        );
        let mut ds = self.extendible(dtype, datatype, len, contents)?;
        ds.attributes = attributes;
        self.replace(parent, name, ds, path)
    }

    /// Swap the dataset behind `name` in place; list positions and object
    /// order stay as they were.
    fn replace(&mut self, parent: ObjectId, name: &str, dataset: Dataset, path: &str) -> Result<ObjectId> {
        trace!(path = %display(path), "replacing dataset");
        self.image
            .relink(parent, name, Object::Dataset(dataset))
            .map_err(|e| self.format_error(e))
    }

    fn dataset_mut(&mut self, id: ObjectId, path: &str) -> Result<&mut Dataset> {
        let file = self.file_name();
        self.image.dataset_mut(id).ok_or_else(|| Error::NotFound {
            file,
            path: display(path),
        })
    }
}

/// Grow `ds` to `required` elements when shorter, then write `n` elements
/// at `offset` spaced by `stride`. New elements outside the window are zero.
fn write_window(
    ds: &mut Dataset,
    (offset, stride, n): (u64, u64, u64),
    required: u64,
    data: &[u8],
) -> Result<(), rustyconduit_format::FormatError> {
    if n == 0 {
        return Ok(());
    }
    let current = ds.shape().first().copied().unwrap_or(0);
    if current < required {
        ds.set_extent(&[required])?;
    }
    let sel = Hyperslab {
        start: vec![offset],
        stride: vec![stride],
        count: vec![n],
    };
    ds.write_selection(&sel, data)
}

/// H5Z-ZFP style client data: mode, then the mode's parameter.
fn zfp_parameters(mode: ZfpMode, c: &crate::options::Compression) -> Vec<u32> {
    let split = |v: f64| {
        let bits = v.to_bits();
        [bits as u32, (bits >> 32) as u32]
    };
    match mode {
        ZfpMode::Rate => [vec![1, 0], split(c.rate).to_vec()].concat(),
        ZfpMode::Precision => vec![2, 0, c.precision],
        ZfpMode::Accuracy => [vec![3, 0], split(c.accuracy).to_vec()].concat(),
        ZfpMode::Expert => vec![4, 0],
    }
}
