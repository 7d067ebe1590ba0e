//! Store contents back into node trees.

use std::collections::HashSet;

use rustyconduit::{DataType, Endianness, Node, TypeId};
use rustyconduit_format::{ByteOrder, Dataset, Datatype, Group, Object, ObjectId, StorageLayout};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::mapping::{describe, type_id_of, LIST_MARKER};
use crate::path::{display, join, normalize};
use crate::slab::{SlabOptions, SlabParams};
use crate::store::Hdf5File;

impl Hdf5File {
    /// The whole subtree at `path`.
    pub fn read(&self, path: &str) -> Result<Node> {
        self.read_with_options(path, &SlabOptions::new())
    }

    /// The subtree at `path`, with every dataset read through `opts`.
    pub fn read_with_options(&self, path: &str, opts: &SlabOptions) -> Result<Node> {
        let mut node = Node::new();
        self.read_into(path, &mut node, opts)?;
        Ok(node)
    }

    /// Merge the subtree at `path` into `dest`.
    pub fn read_into(&self, path: &str, dest: &mut Node, opts: &SlabOptions) -> Result<()> {
        let path = normalize(path);
        let id = self.locate(&path)?;
        debug!(file = %self.file_name(), path = %display(&path), "reading tree");
        let mut ancestors = HashSet::new();
        let node = self.read_object(id, &path, opts, &mut ancestors)?;
        dest.update(&node);
        Ok(())
    }

    /// Shape and storage of every dataset under `path`, laid out like the
    /// tree [`read`](Self::read) would return.
    pub fn read_info(&self, path: &str) -> Result<Node> {
        let path = normalize(path);
        let id = self.locate(&path)?;
        let mut ancestors = HashSet::new();
        self.info_object(id, &path, &mut ancestors)
    }

    fn read_object(
        &self,
        id: ObjectId,
        path: &str,
        opts: &SlabOptions,
        ancestors: &mut HashSet<ObjectId>,
    ) -> Result<Node> {
        match self.image.get(id) {
            Some(Object::Dataset(ds)) => self.read_dataset(ds, path, opts),
            Some(Object::Group(group)) => {
                let is_list = group.attribute(LIST_MARKER).is_some();
                let mut node = Node::from_dtype(if is_list { DataType::list() } else { DataType::object() });
                ancestors.insert(id);
                for (name, target) in self.acyclic_links(group, path, ancestors) {
                    let child = self.read_object(target, &join(path, &name), opts, ancestors)?;
                    if is_list {
                        *node.append() = child;
                    } else {
                        *node.add_child(&name) = child;
                    }
                }
                ancestors.remove(&id);
                Ok(node)
            }
            None => Err(self.not_found(path)),
        }
    }

    /// Links of `group` that do not lead back to an object on the current
    /// path.
    fn acyclic_links(&self, group: &Group, path: &str, ancestors: &HashSet<ObjectId>) -> Vec<(String, ObjectId)> {
        group
            .links()
            .into_iter()
            .filter(|link| {
                let cycle = ancestors.contains(&link.target);
                if cycle {
                    warn!(
                        file = %self.file_name(),
                        path = %display(&join(path, &link.name)),
                        "skipping link back to an ancestor"
                    );
                }
                !cycle
            })
            .map(|link| (link.name.clone(), link.target))
            .collect()
    }

    fn read_dataset(&self, ds: &Dataset, path: &str, opts: &SlabOptions) -> Result<Node> {
        let id = self.leaf_kind(ds, path)?;
        let params = SlabParams::resolve(opts, &ds.shape()).map_err(|e| self.in_context(path, e))?;
        if opts.metadata_only {
            let mut node = Node::new();
            node.fetch("sizes").set_slice(&params.sizes);
            return Ok(node);
        }
        trace!(path = %display(path), readcount = params.readcount, "reading dataset");

        match id {
            TypeId::Empty => Ok(Node::new()),
            TypeId::Char8Str => {
                if opts.is_slab() {
                    return Err(Error::Usage(format!(
                        "{}:{}: strings cannot be read at an offset or stride",
                        self.file_name(),
                        display(path)
                    )));
                }
                let size = ds.element_size();
                let strings: Vec<Node> = ds
                    .data()
                    .chunks(size.max(1))
                    .map(|bytes| Node::from_leaf_bytes(DataType::char8_str(bytes.len() as u64), bytes.to_vec()))
                    .collect::<rustyconduit::Result<_>>()?;
                match <[Node; 1]>::try_from(strings) {
                    Ok([single]) => Ok(single),
                    Err(many) => {
                        let mut list = Node::from_dtype(DataType::list());
                        for s in many {
                            *list.append() = s;
                        }
                        Ok(list)
                    }
                }
            }
            _ => {
                let bytes = if params.is_whole() {
                    ds.data().to_vec()
                } else {
                    ds.read_selection(&params.hyperslab()).map_err(|e| self.format_error(e))?
                };
                let esize = ds.element_size() as u64;
                let stored = match ds.datatype.byte_order() {
                    Some(ByteOrder::BigEndian) => Endianness::Big,
                    _ => Endianness::Little,
                };
                if stored != Endianness::machine() {
                    trace!(path = %display(path), "normalizing byte order to the machine's");
                }
                let dtype = DataType::new(id, params.readcount, 0, esize, esize, stored);
                let mut node = Node::from_leaf_bytes(dtype, bytes)?;
                node.endian_swap_to_machine();
                Ok(node)
            }
        }
    }

    /// Leaf kind stored in `ds`, or a kind error for datatypes that have
    /// no fixed-size leaf counterpart.
    fn leaf_kind(&self, ds: &Dataset, path: &str) -> Result<TypeId> {
        match (&ds.datatype, type_id_of(&ds.datatype)) {
            (Datatype::VariableLength { .. }, _) | (_, None) => {
                debug!(path = %display(path), datatype = %describe(&ds.datatype), "unsupported dataset");
                Err(self.wrong_kind(path, "fixed-size leaf dataset", "dataset of an unsupported datatype"))
            }
            (_, Some(id)) => Ok(id),
        }
    }

    /// Attach the file and path to option errors raised without them.
    fn in_context(&self, path: &str, e: Error) -> Error {
        let at = format!("{}:{}", self.file_name(), display(path));
        match e {
            Error::OutOfRange(m) => Error::OutOfRange(format!("{at}: {m}")),
            Error::Usage(m) => Error::Usage(format!("{at}: {m}")),
            other => other,
        }
    }

    fn info_object(&self, id: ObjectId, path: &str, ancestors: &mut HashSet<ObjectId>) -> Result<Node> {
        match self.image.get(id) {
            Some(Object::Dataset(ds)) => Ok(dataset_info(ds)),
            Some(Object::Group(group)) => {
                let is_list = group.attribute(LIST_MARKER).is_some();
                let mut node = Node::from_dtype(if is_list { DataType::list() } else { DataType::object() });
                ancestors.insert(id);
                for (name, target) in self.acyclic_links(group, path, ancestors) {
                    let child = self.info_object(target, &join(path, &name), ancestors)?;
                    if is_list {
                        *node.append() = child;
                    } else {
                        *node.add_child(&name) = child;
                    }
                }
                ancestors.remove(&id);
                Ok(node)
            }
            None => Err(self.not_found(path)),
        }
    }
}

fn dataset_info(ds: &Dataset) -> Node {
    let mut info = Node::new();
    info.fetch("dtype").set_string(&describe(&ds.datatype));
    info.fetch("number_of_elements").set(ds.dataspace.num_elements());
    info.fetch("rank").set(ds.dataspace.rank() as u64);
    info.fetch("dims").set_slice(ds.dataspace.dims());
    info.fetch("extendible").set_string(if ds.is_extendible() { "true" } else { "false" });
    info.fetch("layout").set_string(match ds.layout {
        StorageLayout::Compact => "compact",
        StorageLayout::Contiguous => "contiguous",
        StorageLayout::Chunked { .. } => "chunked",
    });
    if let Some(order) = ds.datatype.byte_order() {
        info.fetch("byte_order").set_string(match order {
            ByteOrder::LittleEndian => "little",
            ByteOrder::BigEndian => "big",
        });
    }
    info
}
