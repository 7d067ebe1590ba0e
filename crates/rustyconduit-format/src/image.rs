//! In-memory object graph of an HDF5 file.
//!
//! A [`FileImage`] owns every group and dataset of a file in an arena.
//! Objects are addressed by [`ObjectId`]s whose generation changes when the
//! slot is freed, so a stale id is detected instead of aliasing a newer
//! object. Links may form cycles; the arena does not care.
//!
//! [`FileImage::parse`] loads a whole file and [`FileImage::to_bytes`]
//! writes one back: superblock, then every reachable object header, then
//! raw data (contiguous blocks, chunks and their B-tree nodes).

use std::collections::{HashMap, HashSet, VecDeque};

use rustyconduit_filters::{CodecRegistry, FilterSpec};
use tracing::{debug, trace};

use crate::attribute::Attribute;
use crate::btree::{build_chunk_tree, collect_chunks, ChunkRecord};
use crate::bytes::{Cursor, UNDEF_ADDR};
use crate::chunks;
use crate::dataspace::{Dataspace, UNLIMITED};
use crate::datatype::Datatype;
use crate::error::FormatError;
use crate::filter_pipeline::{parse_pipeline, serialize_pipeline};
use crate::hyperslab::Hyperslab;
use crate::layout::{fill_value_message, DataLayout};
use crate::link::{group_info_message, LinkInfo, LinkMessage, LinkTarget};
use crate::message::MessageType;
use crate::object_header::{ObjectHeader, ObjectHeaderWriter, MSG_FLAG_CONSTANT};
use crate::superblock::{find_signature, Superblock, SUPERBLOCK_SIZE};

/// Handle to an object inside a [`FileImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

/// A named hard link from a group to an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub target: ObjectId,
    pub creation_order: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct Group {
    links: Vec<Link>,
    pub attributes: Vec<Attribute>,
    track_creation_order: bool,
    next_creation_order: u64,
}

impl Group {
    /// Empty group that records link creation order.
    pub fn new() -> Self {
        Self {
            track_creation_order: true,
            ..Self::default()
        }
    }

    pub fn tracks_creation_order(&self) -> bool {
        self.track_creation_order
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Links by creation order when every link has one, else by name.
    pub fn links(&self) -> Vec<&Link> {
        let mut links: Vec<&Link> = self.links.iter().collect();
        if self.track_creation_order && links.iter().all(|l| l.creation_order.is_some()) {
            links.sort_by_key(|l| l.creation_order);
        } else {
            links.sort_by(|a, b| a.name.cmp(&b.name));
        }
        links
    }

    pub fn add_link(&mut self, name: &str, target: ObjectId) -> Result<(), FormatError> {
        if name.is_empty() || name.contains('/') {
            return Err(FormatError::Invalid(format!("link name {name:?}")));
        }
        if self.link(name).is_some() {
            return Err(FormatError::Invalid(format!("link {name:?} already exists")));
        }
        let creation_order = self.track_creation_order.then_some(self.next_creation_order);
        self.next_creation_order += 1;
        self.links.push(Link {
            name: name.to_string(),
            target,
            creation_order,
        });
        Ok(())
    }

    /// Point the existing link `name` at `target`, keeping its position.
    /// Returns the previous target.
    pub fn retarget(&mut self, name: &str, target: ObjectId) -> Option<ObjectId> {
        let link = self.links.iter_mut().find(|l| l.name == name)?;
        Some(std::mem::replace(&mut link.target, target))
    }

    pub fn remove_link(&mut self, name: &str) -> Option<Link> {
        let pos = self.links.iter().position(|l| l.name == name)?;
        Some(self.links.remove(pos))
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Add `attr`, replacing any attribute of the same name.
    pub fn set_attribute(&mut self, attr: Attribute) {
        self.attributes.retain(|a| a.name != attr.name);
        self.attributes.push(attr);
    }
}

/// Storage class used when the dataset is written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLayout {
    Compact,
    Contiguous,
    Chunked { chunk_dims: Vec<u64> },
}

/// A dataset with its full logical contents decoded in memory.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub layout: StorageLayout,
    pub filters: Vec<FilterSpec>,
    pub attributes: Vec<Attribute>,
    data: Vec<u8>,
}

impl Dataset {
    pub fn new(
        datatype: Datatype,
        dataspace: Dataspace,
        layout: StorageLayout,
        data: Vec<u8>,
    ) -> Result<Self, FormatError> {
        let ds = Self {
            datatype,
            dataspace,
            layout,
            filters: Vec::new(),
            attributes: Vec::new(),
            data,
        };
        let expected = ds.dataspace.num_elements() as usize * ds.element_size();
        if ds.data.len() != expected {
            return Err(FormatError::Invalid(format!(
                "dataset needs {expected} bytes, got {}",
                ds.data.len()
            )));
        }
        if let StorageLayout::Chunked { chunk_dims } = &ds.layout {
            if chunk_dims.len() != ds.dataspace.rank() || chunk_dims.contains(&0) {
                return Err(FormatError::Invalid(format!("chunk shape {chunk_dims:?}")));
            }
        }
        Ok(ds)
    }

    pub fn with_filters(mut self, filters: Vec<FilterSpec>) -> Self {
        self.filters = filters;
        self
    }

    pub fn element_size(&self) -> usize {
        self.datatype.size() as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shape used for selections: scalars are `[1]`, null spaces `[0]`.
    pub fn shape(&self) -> Vec<u64> {
        match &self.dataspace {
            Dataspace::Scalar => vec![1],
            Dataspace::Null => vec![0],
            Dataspace::Simple { dims, .. } => dims.clone(),
        }
    }

    pub fn is_extendible(&self) -> bool {
        self.dataspace.is_extendible()
    }

    /// Grow (or shrink) to `new_dims`, keeping overlapping elements and
    /// zero-filling new ones. Only allowed within the maximum dimensions.
    pub fn set_extent(&mut self, new_dims: &[u64]) -> Result<(), FormatError> {
        let Dataspace::Simple { dims, max_dims } = self.dataspace.clone() else {
            return Err(FormatError::Invalid("set_extent on a scalar or null dataspace".into()));
        };
        let max = max_dims.clone().unwrap_or_else(|| dims.clone());
        if new_dims.len() != dims.len()
            || new_dims.iter().zip(&max).any(|(n, m)| *m != UNLIMITED && n > m)
        {
            return Err(FormatError::Invalid(format!(
                "extent {new_dims:?} exceeds maximum {max:?}"
            )));
        }
        let esize = self.element_size();
        let too_large = || FormatError::Invalid(format!("extent {new_dims:?} is too large to hold in memory"));
        let bytes = new_dims
            .iter()
            .try_fold(esize as u64, |acc, d| acc.checked_mul(*d))
            .and_then(|b| usize::try_from(b).ok())
            .ok_or_else(too_large)?;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes).map_err(|_| too_large())?;
        data.resize(bytes, 0);
        let keep: Vec<u64> = dims.iter().zip(new_dims).map(|(a, b)| *a.min(b)).collect();
        let zero = vec![0u64; dims.len()];
        chunks::copy_box(&self.data, &dims, &zero, &mut data, new_dims, &zero, &keep, esize);
        self.data = data;
        self.dataspace = Dataspace::Simple {
            dims: new_dims.to_vec(),
            max_dims,
        };
        Ok(())
    }

    pub fn read_selection(&self, sel: &Hyperslab) -> Result<Vec<u8>, FormatError> {
        sel.gather(&self.data, &self.shape(), self.element_size())
    }

    pub fn write_selection(&mut self, sel: &Hyperslab, src: &[u8]) -> Result<(), FormatError> {
        let shape = self.shape();
        let esize = self.element_size();
        sel.scatter(&mut self.data, &shape, esize, src)
    }

    /// Replace the whole contents; `data` must match the current extent.
    pub fn overwrite(&mut self, data: &[u8]) -> Result<(), FormatError> {
        if data.len() != self.data.len() {
            return Err(FormatError::Invalid(format!(
                "overwrite with {} bytes, dataset holds {}",
                data.len(),
                self.data.len()
            )));
        }
        self.data.copy_from_slice(data);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Object {
    Group(Group),
    Dataset(Dataset),
}

impl Object {
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Group(_) => "group",
            Object::Dataset(_) => "dataset",
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    object: Option<Object>,
}

/// Every object of one file, rooted at a group.
#[derive(Debug, Clone)]
pub struct FileImage {
    slots: Vec<Slot>,
    root: ObjectId,
}

impl Default for FileImage {
    fn default() -> Self {
        Self::new()
    }
}

impl FileImage {
    /// A file holding only an empty root group.
    pub fn new() -> Self {
        let mut image = Self {
            slots: Vec::new(),
            root: ObjectId {
                index: 0,
                generation: 0,
            },
        };
        image.root = image.insert(Object::Group(Group::new()));
        image
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn insert(&mut self, object: Object) -> ObjectId {
        if let Some(index) = self.slots.iter().position(|s| s.object.is_none()) {
            let slot = &mut self.slots[index];
            slot.object = Some(object);
            return ObjectId {
                index: index as u32,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        ObjectId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_mut()
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn group(&self, id: ObjectId) -> Option<&Group> {
        match self.get(id)? {
            Object::Group(g) => Some(g),
            Object::Dataset(_) => None,
        }
    }

    pub fn group_mut(&mut self, id: ObjectId) -> Option<&mut Group> {
        match self.get_mut(id)? {
            Object::Group(g) => Some(g),
            Object::Dataset(_) => None,
        }
    }

    pub fn dataset(&self, id: ObjectId) -> Option<&Dataset> {
        match self.get(id)? {
            Object::Dataset(d) => Some(d),
            Object::Group(_) => None,
        }
    }

    pub fn dataset_mut(&mut self, id: ObjectId) -> Option<&mut Dataset> {
        match self.get_mut(id)? {
            Object::Dataset(d) => Some(d),
            Object::Group(_) => None,
        }
    }

    /// Follow `path` (slash separated, relative to `from`).
    pub fn resolve(&self, from: ObjectId, path: &str) -> Option<ObjectId> {
        let mut at = from;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            at = self.group(at)?.link(part)?.target;
        }
        self.is_live(at).then_some(at)
    }

    /// Insert `object` and link it into `parent` as `name`.
    pub fn add_child(&mut self, parent: ObjectId, name: &str, object: Object) -> Result<ObjectId, FormatError> {
        let exists = self
            .group(parent)
            .ok_or_else(|| FormatError::Invalid("parent is not a live group".into()))?
            .link(name)
            .is_some();
        if exists {
            return Err(FormatError::Invalid(format!("link {name:?} already exists")));
        }
        let id = self.insert(object);
        if let Some(group) = self.group_mut(parent) {
            group.add_link(name, id)?;
        }
        Ok(id)
    }

    /// Remove the link `name` from `parent` and free every object that is no
    /// longer reachable from the root. Returns the unlinked target.
    pub fn unlink(&mut self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        let link = self.group_mut(parent)?.remove_link(name)?;
        self.sweep();
        Some(link.target)
    }

    /// Swap the object behind `parent`'s link `name` for `object`. The link
    /// keeps its name and creation order; the old object is freed once
    /// unreachable.
    pub fn relink(&mut self, parent: ObjectId, name: &str, object: Object) -> Result<ObjectId, FormatError> {
        let linked = self
            .group(parent)
            .ok_or_else(|| FormatError::Invalid("parent is not a live group".into()))?
            .link(name)
            .is_some();
        if !linked {
            return Err(FormatError::Invalid(format!("no link {name:?} to replace")));
        }
        let id = self.insert(object);
        if let Some(group) = self.group_mut(parent) {
            group.retarget(name, id);
        }
        self.sweep();
        Ok(id)
    }

    /// Free every object no longer reachable from the root.
    fn sweep(&mut self) {
        let live: HashSet<ObjectId> = self.reachable().into_iter().collect();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let id = ObjectId {
                index: index as u32,
                generation: slot.generation,
            };
            if slot.object.is_some() && !live.contains(&id) {
                trace!(index, "freeing unreachable object");
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }

    /// Objects reachable from the root, breadth first, each once.
    fn reachable(&self) -> Vec<ObjectId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) || !self.is_live(id) {
                continue;
            }
            order.push(id);
            if let Some(group) = self.group(id) {
                queue.extend(group.links().into_iter().map(|l| l.target));
            }
        }
        order
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Load a complete file.
    pub fn parse(bytes: &[u8], codecs: &CodecRegistry) -> Result<FileImage, FormatError> {
        let at = find_signature(bytes)?;
        let sb = Superblock::parse(bytes, at)?;
        let file = bytes
            .get(sb.base_address as usize..)
            .ok_or(FormatError::Invalid("base address past end of file".into()))?;
        debug!(version = sb.version, len = bytes.len(), "parsing HDF5 image");

        let mut loader = Loader {
            file,
            offset_size: sb.offset_size,
            length_size: sb.length_size,
            codecs,
            image: FileImage {
                slots: Vec::new(),
                root: ObjectId {
                    index: 0,
                    generation: 0,
                },
            },
            seen: HashMap::new(),
        };
        let root = loader.load(sb.root_group_address)?;
        if loader.image.group(root).is_none() {
            return Err(FormatError::Invalid("root object is not a group".into()));
        }
        loader.image.root = root;
        Ok(loader.image)
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    /// Encode the reachable part of the image as a complete file.
    pub fn to_bytes(&self, codecs: &CodecRegistry) -> Result<Vec<u8>, FormatError> {
        let order = self.reachable();

        // raw storage does not depend on addresses, so encode it first
        let mut stored: HashMap<ObjectId, Stored> = HashMap::new();
        for &id in &order {
            if let Some(ds) = self.dataset(id) {
                stored.insert(id, Stored::encode(ds, codecs)?);
            }
        }

        // header sizes do not depend on addresses either
        let mut sizes = Vec::with_capacity(order.len());
        for &id in &order {
            let header = self.encode_header(id, &|_| 0, 0, codecs)?;
            sizes.push(header.len() as u64);
        }

        let mut addr_of: HashMap<ObjectId, u64> = HashMap::new();
        let mut next = SUPERBLOCK_SIZE as u64;
        for (&id, size) in order.iter().zip(&sizes) {
            addr_of.insert(id, next);
            next += size;
        }

        let mut data_addr: HashMap<ObjectId, u64> = HashMap::new();
        let mut raw = Vec::new();
        for &id in &order {
            let Some(s) = stored.get_mut(&id) else { continue };
            let placed = s.place(next + raw.len() as u64, &mut raw);
            data_addr.insert(id, placed);
        }
        let eof = next + raw.len() as u64;

        let lookup = |id: ObjectId| addr_of.get(&id).copied().unwrap_or(UNDEF_ADDR);
        let mut out = Superblock::for_writing(lookup(self.root), eof).serialize();
        for &id in &order {
            let at = data_addr.get(&id).copied().unwrap_or(UNDEF_ADDR);
            let header = self.encode_header(id, &lookup, at, codecs)?;
            out.extend_from_slice(&header);
        }
        out.extend_from_slice(&raw);
        debug!(objects = order.len(), bytes = out.len(), "encoded HDF5 image");
        Ok(out)
    }

    fn encode_header(
        &self,
        id: ObjectId,
        addr_of: &dyn Fn(ObjectId) -> u64,
        data_addr: u64,
        codecs: &CodecRegistry,
    ) -> Result<Vec<u8>, FormatError> {
        let mut w = ObjectHeaderWriter::new();
        match self.get(id) {
            Some(Object::Group(group)) => {
                let max_order = group.links.iter().filter_map(|l| l.creation_order).max();
                let info = LinkInfo::compact(group.track_creation_order, max_order.unwrap_or(0));
                w.add(MessageType::LinkInfo, info.serialize());
                w.add(MessageType::GroupInfo, group_info_message());
                for link in group.links() {
                    let msg = LinkMessage::hard(&link.name, addr_of(link.target), link.creation_order);
                    w.add(MessageType::Link, msg.serialize()?);
                }
                for attr in &group.attributes {
                    w.add(MessageType::Attribute, attr.serialize()?);
                }
            }
            Some(Object::Dataset(ds)) => {
                let chunked = matches!(ds.layout, StorageLayout::Chunked { .. });
                w.add(MessageType::Dataspace, ds.dataspace.serialize());
                w.add_with_flags(MessageType::Datatype, ds.datatype.serialize()?, MSG_FLAG_CONSTANT);
                w.add_with_flags(MessageType::FillValue, fill_value_message(chunked), MSG_FLAG_CONSTANT);
                if chunked && !ds.filters.is_empty() {
                    let pipeline =
                        serialize_pipeline(&ds.filters, |fid| codecs.name_of(fid).map(str::to_string));
                    w.add(MessageType::FilterPipeline, pipeline);
                }
                let layout = match &ds.layout {
                    StorageLayout::Compact => DataLayout::Compact {
                        data: ds.data.clone(),
                    },
                    StorageLayout::Contiguous => DataLayout::Contiguous {
                        address: data_addr,
                        size: ds.data.len() as u64,
                    },
                    StorageLayout::Chunked { chunk_dims } => {
                        let mut dims: Vec<u32> = chunk_dims.iter().map(|&d| d as u32).collect();
                        dims.push(ds.element_size() as u32);
                        DataLayout::Chunked {
                            btree_address: data_addr,
                            dims,
                        }
                    }
                };
                w.add(MessageType::DataLayout, layout.serialize()?);
                for attr in &ds.attributes {
                    w.add(MessageType::Attribute, attr.serialize()?);
                }
            }
            None => return Err(FormatError::Invalid("stale object in image".into())),
        }
        w.serialize()
    }
}

/// Raw storage prepared for one dataset.
enum Stored {
    Inline,
    Block(Vec<u8>),
    Chunks {
        chunk_dims: Vec<u64>,
        records: Vec<ChunkRecord>,
        payloads: Vec<Vec<u8>>,
    },
}

impl Stored {
    fn encode(ds: &Dataset, codecs: &CodecRegistry) -> Result<Stored, FormatError> {
        Ok(match &ds.layout {
            StorageLayout::Compact => Stored::Inline,
            StorageLayout::Contiguous => Stored::Block(ds.data.clone()),
            StorageLayout::Chunked { chunk_dims } => {
                let esize = ds.element_size();
                let mut records = Vec::new();
                let mut payloads = Vec::new();
                for (offsets, chunk) in chunks::split(&ds.data, &ds.shape(), chunk_dims, esize) {
                    let payload = codecs.encode_chunk(&chunk, &ds.filters, esize)?;
                    records.push(ChunkRecord {
                        offsets,
                        stored_size: payload.len() as u32,
                        filter_mask: 0,
                        address: UNDEF_ADDR,
                    });
                    payloads.push(payload);
                }
                Stored::Chunks {
                    chunk_dims: chunk_dims.clone(),
                    records,
                    payloads,
                }
            }
        })
    }

    /// Append to `raw` (which starts at file address `at`); returns the
    /// address the layout message should point at.
    fn place(&mut self, at: u64, raw: &mut Vec<u8>) -> u64 {
        match self {
            Stored::Inline => UNDEF_ADDR,
            Stored::Block(bytes) if bytes.is_empty() => UNDEF_ADDR,
            Stored::Block(bytes) => {
                raw.extend_from_slice(bytes);
                at
            }
            Stored::Chunks {
                chunk_dims,
                records,
                payloads,
            } => {
                let mut addr = at;
                for (rec, payload) in records.iter_mut().zip(payloads.iter()) {
                    rec.address = addr;
                    raw.extend_from_slice(payload);
                    addr += payload.len() as u64;
                }
                let (nodes, root) = build_chunk_tree(records, chunk_dims, addr);
                raw.extend_from_slice(&nodes);
                root
            }
        }
    }
}

struct Loader<'a> {
    file: &'a [u8],
    offset_size: u8,
    length_size: u8,
    codecs: &'a CodecRegistry,
    image: FileImage,
    seen: HashMap<u64, ObjectId>,
}

impl Loader<'_> {
    fn load(&mut self, addr: u64) -> Result<ObjectId, FormatError> {
        if let Some(&id) = self.seen.get(&addr) {
            return Ok(id);
        }
        let oh = ObjectHeader::parse(self.file, addr as usize, self.offset_size, self.length_size)?;
        let attributes = oh
            .all(MessageType::Attribute)
            .map(|m| Attribute::parse(&m.data, self.length_size))
            .collect::<Result<Vec<_>, _>>()?;

        if oh.first(MessageType::DataLayout).is_some() {
            let mut ds = self.load_dataset(&oh)?;
            ds.attributes = attributes;
            let id = self.image.insert(Object::Dataset(ds));
            self.seen.insert(addr, id);
            return Ok(id);
        }

        // register before descending so cycles resolve to this id
        let id = self.image.insert(Object::Group(Group::default()));
        self.seen.insert(addr, id);
        trace!(addr, "loading group");

        let info = match oh.first(MessageType::LinkInfo) {
            Some(m) => Some(LinkInfo::parse(&m.data, self.offset_size)?),
            None if oh.first(MessageType::Other(0x11)).is_some() => {
                return Err(FormatError::Unsupported("symbol-table (old-style) groups".into()))
            }
            None => None,
        };
        if info.as_ref().is_some_and(LinkInfo::is_dense) {
            return Err(FormatError::Unsupported("dense link storage".into()));
        }

        let mut links = Vec::new();
        for m in oh.all(MessageType::Link) {
            let link = LinkMessage::parse(&m.data, self.offset_size)?;
            match link.target {
                LinkTarget::Hard(target) => {
                    let child = self.load(target)?;
                    links.push(Link {
                        name: link.name,
                        target: child,
                        creation_order: link.creation_order,
                    });
                }
                other => debug!(name = %link.name, target = ?other, "skipping non-hard link"),
            }
        }
        let track = info.as_ref().is_some_and(|i| i.track_creation_order);
        let next = links
            .iter()
            .filter_map(|l| l.creation_order)
            .max()
            .map_or(0, |m| m + 1);
        if let Some(group) = self.image.group_mut(id) {
            group.links = links;
            group.attributes = attributes;
            group.track_creation_order = track;
            group.next_creation_order = next;
        }
        Ok(id)
    }

    fn load_dataset(&self, oh: &ObjectHeader) -> Result<Dataset, FormatError> {
        let missing = |what: &str| FormatError::Invalid(format!("dataset without {what} message"));
        let dataspace = Dataspace::parse(
            &oh.first(MessageType::Dataspace).ok_or_else(|| missing("dataspace"))?.data,
            self.length_size,
        )?;
        let (datatype, _) =
            Datatype::parse(&oh.first(MessageType::Datatype).ok_or_else(|| missing("datatype"))?.data)?;
        let layout = DataLayout::parse(
            &oh.first(MessageType::DataLayout).ok_or_else(|| missing("layout"))?.data,
            self.offset_size,
            self.length_size,
        )?;
        let filters = match oh.first(MessageType::FilterPipeline) {
            Some(m) => parse_pipeline(&m.data)?,
            None => Vec::new(),
        };

        let esize = datatype.size() as usize;
        let total = dataspace.num_elements() as usize * esize;
        let shape = match &dataspace {
            Dataspace::Scalar => vec![1],
            Dataspace::Null => vec![0],
            Dataspace::Simple { dims, .. } => dims.clone(),
        };

        let (storage, data) = match layout {
            DataLayout::Compact { mut data } => {
                data.resize(total, 0);
                (StorageLayout::Compact, data)
            }
            DataLayout::Contiguous { address, size } => {
                let data = if address == UNDEF_ADDR || size == 0 {
                    vec![0u8; total]
                } else {
                    let mut c = Cursor::at(self.file, address as usize);
                    let mut bytes = c.bytes(size.min(total as u64) as usize)?.to_vec();
                    bytes.resize(total, 0);
                    bytes
                };
                (StorageLayout::Contiguous, data)
            }
            DataLayout::Chunked { btree_address, dims } => {
                let rank = dims.len().saturating_sub(1);
                if rank != shape.len() {
                    return Err(FormatError::Invalid(format!(
                        "chunk rank {rank} for dataspace rank {}",
                        shape.len()
                    )));
                }
                let chunk_dims: Vec<u64> = dims[..rank].iter().map(|&d| u64::from(d)).collect();
                let records = collect_chunks(self.file, btree_address, rank, self.offset_size)?;
                let mut decoded = Vec::with_capacity(records.len());
                for rec in &records {
                    let stored = Cursor::at(self.file, rec.address as usize).bytes(rec.stored_size as usize)?;
                    let bytes = self.codecs.decode_chunk(stored, &filters, rec.filter_mask, esize)?;
                    decoded.push((rec.offsets.as_slice(), bytes));
                }
                let data = chunks::assemble(&shape, &chunk_dims, esize, decoded)?;
                (StorageLayout::Chunked { chunk_dims }, data)
            }
        };

        Ok(Dataset {
            datatype,
            dataspace,
            layout: storage,
            filters,
            attributes: Vec::new(),
            data,
        })
    }
}
