//! The [`Node`] tree.
//!
//! A node is exactly one of empty, leaf, object (named children in insertion
//! order) or list (anonymous ordered children). Assigning a new role drops
//! whatever the previous role owned. Children are owned by their parent;
//! there are no parent pointers, so paths are carried by whoever walks the
//! tree.
//!
//! There is no `Node::parent()`. Code that needs ancestors keeps them on
//! its own stack while walking, the way `length: {"reference": "../n"}`
//! lookups and the HDF5 reader's cycle guard do.

use std::fmt;

use indexmap::IndexMap;

use crate::dtype::{DataType, Endianness, TypeId};
use crate::element::{read_num, write_num, Element, Num};
use crate::error::{join_path, Error, Result};
use crate::schema::Schema;

pub struct Node {
    kind: Kind,
}

enum Kind {
    Empty,
    Leaf { dtype: DataType, data: LeafData },
    Object(IndexMap<String, Node>),
    List(Vec<Node>),
}

enum LeafData {
    Owned(Vec<u8>),
    /// Caller memory bound through an `unsafe` entry point; the caller
    /// keeps it alive and unaliased for as long as the node uses it.
    External { ptr: *mut u8, len: usize },
}

impl LeafData {
    fn bytes(&self) -> &[u8] {
        match self {
            LeafData::Owned(v) => v,
            LeafData::External { len: 0, .. } => &[],
            // SAFETY: the binding call's contract guarantees `ptr..ptr+len`
            // is valid for the node's lifetime.
            LeafData::External { ptr, len } => unsafe { std::slice::from_raw_parts(*ptr, *len) },
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            LeafData::Owned(v) => v,
            LeafData::External { len: 0, .. } => &mut [],
            // SAFETY: as in `bytes`.
            LeafData::External { ptr, len } => unsafe { std::slice::from_raw_parts_mut(*ptr, *len) },
        }
    }
}

/// Split a `/` path, dropping empty and `.` segments and folding `..`.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    parts
}

fn check_span(dtype: &DataType, len: usize, what: &str) -> Result<()> {
    if !dtype.id().is_leaf() {
        return Err(Error::Layout(format!("{what}: {} is not a leaf type", dtype.id())));
    }
    if dtype.element_bytes() < dtype.id().default_bytes() {
        return Err(Error::Layout(format!(
            "{what}: {} elements need at least {} bytes, got {}",
            dtype.id(),
            dtype.id().default_bytes(),
            dtype.element_bytes()
        )));
    }
    if dtype.spanned_bytes() > len as u64 {
        return Err(Error::Layout(format!(
            "{what}: {dtype} spans {} bytes but the buffer holds {len}",
            dtype.spanned_bytes()
        )));
    }
    Ok(())
}

impl Node {
    pub fn new() -> Node {
        Node { kind: Kind::Empty }
    }

    /// Node of `dtype`'s role; leaves are zero-filled and compact.
    pub fn from_dtype(dtype: DataType) -> Node {
        let mut node = Node::new();
        node.set_dtype(dtype);
        node
    }

    /// Leaf that owns `bytes`, laid out by `dtype`.
    pub fn from_leaf_bytes(dtype: DataType, bytes: Vec<u8>) -> Result<Node> {
        check_span(&dtype, bytes.len(), "leaf")?;
        Ok(Node {
            kind: Kind::Leaf {
                dtype,
                data: LeafData::Owned(bytes),
            },
        })
    }

    /// Leaf that views caller memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long
    /// as the returned node (or any node it is moved into) is used.
    pub(crate) unsafe fn external_leaf(dtype: DataType, ptr: *mut u8, len: usize) -> Result<Node> {
        check_span(&dtype, len, "external leaf")?;
        Ok(Node {
            kind: Kind::Leaf {
                dtype,
                data: LeafData::External { ptr, len },
            },
        })
    }

    pub(crate) fn from_object(children: IndexMap<String, Node>) -> Node {
        Node {
            kind: Kind::Object(children),
        }
    }

    pub(crate) fn from_list(children: Vec<Node>) -> Node {
        Node {
            kind: Kind::List(children),
        }
    }

    pub fn set_dtype(&mut self, dtype: DataType) {
        self.kind = match dtype.id() {
            TypeId::Empty => Kind::Empty,
            TypeId::Object => Kind::Object(IndexMap::new()),
            TypeId::List => Kind::List(Vec::new()),
            _ => {
                let dtype = dtype.compact();
                Kind::Leaf {
                    data: LeafData::Owned(vec![0; dtype.bytes_compact() as usize]),
                    dtype,
                }
            }
        };
    }

    pub fn reset(&mut self) {
        self.kind = Kind::Empty;
    }

    // ------------------------------------------------------------------
    // setters
    // ------------------------------------------------------------------

    pub fn set<T: Element>(&mut self, value: T) {
        self.set_slice(&[value]);
    }

    pub fn set_slice<T: Element>(&mut self, values: &[T]) {
        let size = std::mem::size_of::<T>();
        let big = Endianness::machine().is_big();
        let mut data = vec![0u8; values.len() * size];
        for (out, v) in data.chunks_exact_mut(size).zip(values) {
            v.write(out, big);
        }
        self.kind = Kind::Leaf {
            dtype: DataType::with_defaults(T::ID, values.len() as u64),
            data: LeafData::Owned(data),
        };
    }

    /// Store `value` as a null-terminated `char8_str`.
    pub fn set_string(&mut self, value: &str) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.kind = Kind::Leaf {
            dtype: DataType::char8_str(data.len() as u64),
            data: LeafData::Owned(data),
        };
    }

    /// Build the tree described by `schema`, copying every leaf out of
    /// `data` into compact storage.
    pub fn set_data_using_schema(&mut self, schema: &Schema, data: &[u8]) -> Result<()> {
        *self = Node::copy_from_schema(schema, data)?;
        Ok(())
    }

    fn copy_from_schema(schema: &Schema, data: &[u8]) -> Result<Node> {
        let dtype = schema.dtype();
        Ok(match dtype.id() {
            TypeId::Empty => Node::new(),
            TypeId::Object => Node::from_object(
                schema
                    .entries()
                    .map(|(name, child)| Ok((name.to_string(), Node::copy_from_schema(child, data)?)))
                    .collect::<Result<_>>()?,
            ),
            TypeId::List => Node::from_list(
                schema
                    .children()
                    .map(|child| Node::copy_from_schema(child, data))
                    .collect::<Result<_>>()?,
            ),
            _ => {
                check_span(&dtype, data.len(), "set_data_using_schema")?;
                Node::from_leaf_bytes(dtype.compact(), gather(&dtype, data))?
            }
        })
    }

    /// Build the tree described by `schema` with every leaf viewing the
    /// caller's buffer at its schema offset. Nothing is copied.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long
    /// as this node (or any of its leaves) is used, and must not be
    /// accessed through other references in the meantime.
    pub unsafe fn set_external_data_using_schema(
        &mut self,
        schema: &Schema,
        ptr: *mut u8,
        len: usize,
    ) -> Result<()> {
        *self = Node::bind_schema(schema, ptr, len)?;
        Ok(())
    }

    unsafe fn bind_schema(schema: &Schema, ptr: *mut u8, len: usize) -> Result<Node> {
        let dtype = schema.dtype();
        Ok(match dtype.id() {
            TypeId::Empty => Node::new(),
            TypeId::Object => {
                let mut children = IndexMap::new();
                for (name, child) in schema.entries() {
                    children.insert(name.to_string(), Node::bind_schema(child, ptr, len)?);
                }
                Node::from_object(children)
            }
            TypeId::List => {
                let mut children = Vec::new();
                for child in schema.children() {
                    children.push(Node::bind_schema(child, ptr, len)?);
                }
                Node::from_list(children)
            }
            _ => Node::external_leaf(dtype, ptr, len)?,
        })
    }

    /// Merge `other` into this node. Objects merge by name, lists by
    /// position; a leaf of the same kind and count is overwritten in place
    /// (external memory included), any other leaf is replaced.
    pub fn update(&mut self, other: &Node) {
        match &other.kind {
            Kind::Empty => {}
            Kind::Object(children) => {
                let map = self.object_mut();
                for (name, child) in children {
                    map.entry(name.clone()).or_default().update(child);
                }
            }
            Kind::List(children) => {
                let list = self.list_mut();
                for (i, child) in children.iter().enumerate() {
                    match list.get_mut(i) {
                        Some(mine) => mine.update(child),
                        None => list.push(child.clone()),
                    }
                }
            }
            Kind::Leaf { dtype: src, data } => {
                if let Kind::Leaf { dtype, data: dst } = &mut self.kind {
                    if dtype.id() == src.id() && dtype.number_of_elements() == src.number_of_elements() {
                        copy_elements(src, data.bytes(), dtype, dst.bytes_mut());
                        return;
                    }
                }
                *self = other.clone();
            }
        }
    }

    // ------------------------------------------------------------------
    // tree access
    // ------------------------------------------------------------------

    fn object_mut(&mut self) -> &mut IndexMap<String, Node> {
        if !matches!(self.kind, Kind::Object(_)) {
            self.kind = Kind::Object(IndexMap::new());
        }
        match &mut self.kind {
            Kind::Object(map) => map,
            _ => unreachable!("node was just made an object"),
        }
    }

    fn list_mut(&mut self) -> &mut Vec<Node> {
        if !matches!(self.kind, Kind::List(_)) {
            self.kind = Kind::List(Vec::new());
        }
        match &mut self.kind {
            Kind::List(items) => items,
            _ => unreachable!("node was just made a list"),
        }
    }

    /// Child `name`, or list entry `name` when this node is a list and
    /// `name` is an index in range.
    fn lookup(&self, name: &str) -> Option<&Node> {
        match &self.kind {
            Kind::Object(map) => map.get(name),
            Kind::List(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Node> {
        match &mut self.kind {
            Kind::Object(map) => map.get_mut(name),
            Kind::List(items) => name.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        }
    }

    /// Node at `path`, creating objects along the way. A node on the path
    /// that is not an object becomes one (list entries addressed by index
    /// are kept).
    pub fn fetch(&mut self, path: &str) -> &mut Node {
        let mut node = self;
        for name in split_path(path) {
            node = node.fetch_child(name);
        }
        node
    }

    fn fetch_child(&mut self, name: &str) -> &mut Node {
        let index = match &self.kind {
            Kind::List(items) => name.parse::<usize>().ok().filter(|&i| i < items.len()),
            _ => None,
        };
        if let Some(i) = index {
            return &mut self.list_mut()[i];
        }
        self.object_mut().entry(name.to_string()).or_default()
    }

    pub fn fetch_existing(&self, path: &str) -> Result<&Node> {
        let mut node = self;
        for name in split_path(path) {
            node = node.lookup(name).ok_or_else(|| Error::NotFound(path.to_string()))?;
        }
        Ok(node)
    }

    pub fn fetch_existing_mut(&mut self, path: &str) -> Result<&mut Node> {
        let mut node = self;
        for name in split_path(path) {
            node = node
                .lookup_mut(name)
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
        }
        Ok(node)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.fetch_existing(path).is_ok()
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        match &self.kind {
            Kind::Object(map) => map.get(name),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        match &mut self.kind {
            Kind::Object(map) => map.get_mut(name),
            _ => None,
        }
    }

    /// Child by position, for objects and lists.
    pub fn child_at(&self, index: usize) -> Option<&Node> {
        match &self.kind {
            Kind::Object(map) => map.get_index(index).map(|(_, n)| n),
            Kind::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn child_at_mut(&mut self, index: usize) -> Option<&mut Node> {
        match &mut self.kind {
            Kind::Object(map) => map.get_index_mut(index).map(|(_, n)| n),
            Kind::List(items) => items.get_mut(index),
            _ => None,
        }
    }

    /// Child `name` of this node (made an object if it is not one), taken
    /// literally: no `/` splitting or `..` folding.
    pub fn add_child(&mut self, name: &str) -> &mut Node {
        self.object_mut().entry(name.to_string()).or_default()
    }

    /// Add an empty entry to this node, which becomes a list if it was not
    /// one already.
    pub fn append(&mut self) -> &mut Node {
        let items = self.list_mut();
        items.push(Node::new());
        let last = items.len() - 1;
        &mut items[last]
    }

    pub fn remove_child(&mut self, name: &str) -> Option<Node> {
        match &mut self.kind {
            Kind::Object(map) => map.shift_remove(name),
            _ => None,
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Node> {
        match &mut self.kind {
            Kind::Object(map) => map.shift_remove_index(index).map(|(_, n)| n),
            Kind::List(items) if index < items.len() => Some(items.remove(index)),
            _ => None,
        }
    }

    pub fn number_of_children(&self) -> usize {
        match &self.kind {
            Kind::Object(map) => map.len(),
            Kind::List(items) => items.len(),
            _ => 0,
        }
    }

    /// Names of an object's children in insertion order; empty otherwise.
    pub fn child_names(&self) -> Vec<&str> {
        self.entries().map(|(name, _)| name).collect()
    }

    /// Children of an object or list, in order.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        let (map, items) = match &self.kind {
            Kind::Object(map) => (Some(map), None),
            Kind::List(items) => (None, Some(items)),
            _ => (None, None),
        };
        map.into_iter()
            .flat_map(|m| m.values())
            .chain(items.into_iter().flat_map(|l| l.iter()))
    }

    /// Named children of an object.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Node)> {
        let map = match &self.kind {
            Kind::Object(map) => Some(map),
            _ => None,
        };
        map.into_iter().flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    // ------------------------------------------------------------------
    // roles and types
    // ------------------------------------------------------------------

    pub fn dtype(&self) -> DataType {
        match &self.kind {
            Kind::Empty => DataType::empty(),
            Kind::Leaf { dtype, .. } => *dtype,
            Kind::Object(_) => DataType::object(),
            Kind::List(_) => DataType::list(),
        }
    }

    pub fn number_of_elements(&self) -> u64 {
        self.dtype().number_of_elements()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::Empty)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, Kind::Leaf { .. })
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, Kind::Object(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, Kind::List(_))
    }

    pub fn is_number(&self) -> bool {
        self.dtype().is_number()
    }

    pub fn is_string(&self) -> bool {
        self.dtype().is_string()
    }

    /// Whether this leaf views caller memory.
    pub fn is_external(&self) -> bool {
        matches!(
            self.kind,
            Kind::Leaf {
                data: LeafData::External { .. },
                ..
            }
        )
    }

    /// Layout of the tree as it is stored now.
    pub fn schema(&self) -> Schema {
        match &self.kind {
            Kind::Empty => Schema::new(),
            Kind::Leaf { dtype, .. } => Schema::from_dtype(*dtype),
            Kind::Object(map) => {
                Schema::from_object(map.iter().map(|(k, v)| (k.clone(), v.schema())).collect())
            }
            Kind::List(items) => Schema::from_list(items.iter().map(Node::schema).collect()),
        }
    }

    /// Layout the tree would have packed into one buffer, leaves in
    /// depth-first order. Matches [`Node::compact_bytes`].
    pub fn compact_schema(&self) -> Schema {
        let mut schema = self.schema();
        schema.compact();
        schema
    }

    /// Every leaf's elements packed back to back, depth first, each in its
    /// own byte order.
    pub fn compact_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.collect_compact(&mut out);
        out
    }

    fn collect_compact(&self, out: &mut Vec<u8>) {
        match &self.kind {
            Kind::Empty => {}
            Kind::Leaf { dtype, data } => out.extend_from_slice(&gather(dtype, data.bytes())),
            Kind::Object(map) => map.values().for_each(|c| c.collect_compact(out)),
            Kind::List(items) => items.iter().for_each(|c| c.collect_compact(out)),
        }
    }

    /// This leaf's elements packed, in the leaf's byte order.
    pub fn leaf_compact_bytes(&self) -> Result<Vec<u8>> {
        let (dtype, bytes) = self.leaf()?;
        Ok(gather(dtype, bytes))
    }

    /// Rewrite every leaf whose byte order differs from the machine's.
    pub fn endian_swap_to_machine(&mut self) {
        match &mut self.kind {
            Kind::Empty => {}
            Kind::Object(map) => map.values_mut().for_each(Node::endian_swap_to_machine),
            Kind::List(items) => items.iter_mut().for_each(Node::endian_swap_to_machine),
            Kind::Leaf { dtype, data } => {
                if dtype.endianness().resolve() != Endianness::machine() {
                    let width = dtype.id().default_bytes() as usize;
                    let bytes = data.bytes_mut();
                    for i in 0..dtype.number_of_elements() {
                        let at = dtype.element_index(i) as usize;
                        bytes[at..at + width].reverse();
                    }
                }
                dtype.set_endianness(Endianness::Default);
            }
        }
    }

    // ------------------------------------------------------------------
    // values
    // ------------------------------------------------------------------

    fn leaf(&self) -> Result<(&DataType, &[u8])> {
        match &self.kind {
            Kind::Leaf { dtype, data } => Ok((dtype, data.bytes())),
            _ => Err(Error::Access(format!("{} node has no values", self.dtype().id()))),
        }
    }

    /// Elements as `T`; the leaf must be of kind `T::ID`.
    pub fn values<T: Element>(&self) -> Result<Vec<T>> {
        let (dtype, bytes) = self.leaf()?;
        if dtype.id() != T::ID {
            return Err(Error::Access(format!(
                "cannot read {} values from a {} leaf",
                T::ID,
                dtype.id()
            )));
        }
        let big = dtype.endianness().is_big();
        Ok((0..dtype.number_of_elements())
            .map(|i| T::read(&bytes[dtype.element_index(i) as usize..], big))
            .collect())
    }

    /// First element as `T`.
    pub fn value<T: Element>(&self) -> Result<T> {
        self.values::<T>()?
            .first()
            .copied()
            .ok_or_else(|| Error::Access("leaf has no elements".into()))
    }

    /// Elements of any numeric kind.
    pub fn to_num_vec(&self) -> Result<Vec<Num>> {
        let (dtype, bytes) = self.leaf()?;
        if !dtype.is_number() {
            return Err(Error::Access(format!("{} leaf is not numeric", dtype.id())));
        }
        let big = dtype.endianness().is_big();
        (0..dtype.number_of_elements())
            .map(|i| {
                read_num(dtype.id(), &bytes[dtype.element_index(i) as usize..], big)
                    .ok_or_else(|| Error::Access(format!("{} leaf is not numeric", dtype.id())))
            })
            .collect()
    }

    fn first_num(&self) -> Result<Num> {
        self.to_num_vec()?
            .first()
            .copied()
            .ok_or_else(|| Error::Access("leaf has no elements".into()))
    }

    pub fn to_i64(&self) -> Result<i64> {
        Ok(self.first_num()?.as_i64())
    }

    pub fn to_u64(&self) -> Result<u64> {
        Ok(self.first_num()?.as_u64())
    }

    pub fn to_f64(&self) -> Result<f64> {
        Ok(self.first_num()?.as_f64())
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        Ok(self.to_num_vec()?.into_iter().map(Num::as_f64).collect())
    }

    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        Ok(self.to_num_vec()?.into_iter().map(Num::as_i64).collect())
    }

    /// Text of a `char8_str` leaf, up to the first NUL.
    pub fn as_string(&self) -> Result<String> {
        let (dtype, bytes) = self.leaf()?;
        if !dtype.is_string() {
            return Err(Error::Access(format!("{} leaf is not a string", dtype.id())));
        }
        let text: Vec<u8> = (0..dtype.number_of_elements())
            .map(|i| bytes[dtype.element_index(i) as usize])
            .take_while(|&b| b != 0)
            .collect();
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    // ------------------------------------------------------------------
    // comparison
    // ------------------------------------------------------------------

    /// First difference between the two trees, ignoring offsets, strides
    /// and byte order; `None` when they hold the same kinds and values.
    pub fn diff(&self, other: &Node) -> Option<String> {
        self.diff_at(other, "")
    }

    fn diff_at(&self, other: &Node, path: &str) -> Option<String> {
        let here = || if path.is_empty() { "/".to_string() } else { path.to_string() };
        match (&self.kind, &other.kind) {
            (Kind::Empty, Kind::Empty) => None,
            (Kind::Object(a), Kind::Object(b)) => {
                for (name, child) in a {
                    let sub = join_path(path, name);
                    match b.get(name) {
                        Some(theirs) => {
                            if let Some(d) = child.diff_at(theirs, &sub) {
                                return Some(d);
                            }
                        }
                        None => return Some(format!("{sub}: missing on the right")),
                    }
                }
                b.keys()
                    .find(|name| !a.contains_key(*name))
                    .map(|name| format!("{}: missing on the left", join_path(path, name)))
            }
            (Kind::List(a), Kind::List(b)) => {
                if a.len() != b.len() {
                    return Some(format!("{}: {} vs {} entries", here(), a.len(), b.len()));
                }
                a.iter()
                    .zip(b)
                    .enumerate()
                    .find_map(|(i, (x, y))| x.diff_at(y, &join_path(path, &i.to_string())))
            }
            (Kind::Leaf { dtype: da, .. }, Kind::Leaf { dtype: db, .. }) => {
                if da.id() != db.id() || da.number_of_elements() != db.number_of_elements() {
                    return Some(format!(
                        "{}: {}[{}] vs {}[{}]",
                        here(),
                        da.id(),
                        da.number_of_elements(),
                        db.id(),
                        db.number_of_elements()
                    ));
                }
                if da.is_string() {
                    let (a, b) = (self.as_string().ok(), other.as_string().ok());
                    return (a != b).then(|| format!("{}: {a:?} vs {b:?}", here()));
                }
                let (a, b) = (self.to_num_vec().ok()?, other.to_num_vec().ok()?);
                a.iter()
                    .zip(&b)
                    .position(|(x, y)| !x.same(*y))
                    .map(|i| format!("{}[{i}]: {} vs {}", here(), a[i], b[i]))
            }
            _ => Some(format!(
                "{}: {} vs {}",
                here(),
                self.dtype().id(),
                other.dtype().id()
            )),
        }
    }
}

/// Pack the elements `dtype` describes out of `bytes`.
fn gather(dtype: &DataType, bytes: &[u8]) -> Vec<u8> {
    let width = dtype.element_bytes() as usize;
    if dtype.is_compact() {
        return bytes[..dtype.bytes_compact() as usize].to_vec();
    }
    let mut out = Vec::with_capacity(dtype.bytes_compact() as usize);
    for i in 0..dtype.number_of_elements() {
        let at = dtype.element_index(i) as usize;
        out.extend_from_slice(&bytes[at..at + width]);
    }
    out
}

/// Copy elements between two leaves of the same kind and count, converting
/// byte order as needed.
fn copy_elements(src: &DataType, from: &[u8], dst: &DataType, to: &mut [u8]) {
    let (sbig, dbig) = (src.endianness().is_big(), dst.endianness().is_big());
    for i in 0..src.number_of_elements() {
        let (s, d) = (src.element_index(i) as usize, dst.element_index(i) as usize);
        match read_num(src.id(), &from[s..], sbig) {
            Some(num) => {
                write_num(dst.id(), num, &mut to[d..], dbig);
            }
            None => to[d] = from[s],
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::new()
    }
}

impl Clone for Node {
    /// External leaves are copied into owned, compact storage.
    fn clone(&self) -> Node {
        let kind = match &self.kind {
            Kind::Empty => Kind::Empty,
            Kind::Leaf {
                dtype,
                data: LeafData::Owned(bytes),
            } => Kind::Leaf {
                dtype: *dtype,
                data: LeafData::Owned(bytes.clone()),
            },
            Kind::Leaf { dtype, data } => Kind::Leaf {
                dtype: dtype.compact(),
                data: LeafData::Owned(gather(dtype, data.bytes())),
            },
            Kind::Object(map) => Kind::Object(map.clone()),
            Kind::List(items) => Kind::List(items.clone()),
        };
        Node { kind }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.diff(other).is_none()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Empty => f.write_str("Empty"),
            Kind::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Kind::List(items) => f.debug_list().entries(items.iter()).finish(),
            Kind::Leaf { dtype, .. } if dtype.is_string() => {
                write!(f, "{}({:?})", dtype.id(), self.as_string().unwrap_or_default())
            }
            Kind::Leaf { dtype, .. } => {
                let values: Vec<String> = self
                    .to_num_vec()
                    .unwrap_or_default()
                    .iter()
                    .map(Num::to_string)
                    .collect();
                write!(f, "{}[{}]", dtype.id(), values.join(", "))
            }
        }
    }
}
