//! Layout-only projection of a node tree.

use indexmap::IndexMap;

use crate::dtype::{DataType, TypeId};
use crate::error::{Error, Result};
use crate::node::split_path;

/// Same shape as a [`crate::Node`] tree but with data types in place of
/// data. Used to lay out a buffer before any bytes exist.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    kind: SchemaKind,
}

#[derive(Debug, Clone, PartialEq, Default)]
enum SchemaKind {
    #[default]
    Empty,
    Leaf(DataType),
    Object(IndexMap<String, Schema>),
    List(Vec<Schema>),
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    pub fn from_dtype(dtype: DataType) -> Schema {
        let mut schema = Schema::new();
        schema.set_dtype(dtype);
        schema
    }

    /// The layout of `node`, offsets and strides included.
    pub fn from_node(node: &crate::Node) -> Schema {
        node.schema()
    }

    pub(crate) fn from_object(children: IndexMap<String, Schema>) -> Schema {
        Schema {
            kind: SchemaKind::Object(children),
        }
    }

    pub(crate) fn from_list(children: Vec<Schema>) -> Schema {
        Schema {
            kind: SchemaKind::List(children),
        }
    }

    pub fn set_dtype(&mut self, dtype: DataType) {
        self.kind = match dtype.id() {
            TypeId::Empty => SchemaKind::Empty,
            TypeId::Object => SchemaKind::Object(IndexMap::new()),
            TypeId::List => SchemaKind::List(Vec::new()),
            _ => SchemaKind::Leaf(dtype),
        };
    }

    pub fn dtype(&self) -> DataType {
        match &self.kind {
            SchemaKind::Empty => DataType::empty(),
            SchemaKind::Leaf(dtype) => *dtype,
            SchemaKind::Object(_) => DataType::object(),
            SchemaKind::List(_) => DataType::list(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, SchemaKind::Empty)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, SchemaKind::Leaf(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, SchemaKind::Object(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, SchemaKind::List(_))
    }

    fn object_mut(&mut self) -> &mut IndexMap<String, Schema> {
        if !self.is_object() {
            self.kind = SchemaKind::Object(IndexMap::new());
        }
        match &mut self.kind {
            SchemaKind::Object(map) => map,
            _ => unreachable!("schema was just made an object"),
        }
    }

    fn list_mut(&mut self) -> &mut Vec<Schema> {
        if !self.is_list() {
            self.kind = SchemaKind::List(Vec::new());
        }
        match &mut self.kind {
            SchemaKind::List(items) => items,
            _ => unreachable!("schema was just made a list"),
        }
    }

    /// Schema at `path`, creating objects along the way.
    pub fn fetch(&mut self, path: &str) -> &mut Schema {
        let mut schema = self;
        for name in split_path(path) {
            schema = schema.object_mut().entry(name.to_string()).or_default();
        }
        schema
    }

    pub fn fetch_existing(&self, path: &str) -> Result<&Schema> {
        let mut schema = self;
        for name in split_path(path) {
            let next = match &schema.kind {
                SchemaKind::Object(map) => map.get(name),
                SchemaKind::List(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            schema = next.ok_or_else(|| Error::NotFound(path.to_string()))?;
        }
        Ok(schema)
    }

    pub fn child(&self, name: &str) -> Option<&Schema> {
        match &self.kind {
            SchemaKind::Object(map) => map.get(name),
            _ => None,
        }
    }

    pub fn child_at(&self, index: usize) -> Option<&Schema> {
        match &self.kind {
            SchemaKind::Object(map) => map.get_index(index).map(|(_, s)| s),
            SchemaKind::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn append(&mut self) -> &mut Schema {
        let items = self.list_mut();
        items.push(Schema::new());
        let last = items.len() - 1;
        &mut items[last]
    }

    pub fn number_of_children(&self) -> usize {
        match &self.kind {
            SchemaKind::Object(map) => map.len(),
            SchemaKind::List(items) => items.len(),
            _ => 0,
        }
    }

    pub fn child_names(&self) -> Vec<&str> {
        self.entries().map(|(name, _)| name).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Schema)> {
        let map = match &self.kind {
            SchemaKind::Object(map) => Some(map),
            _ => None,
        };
        map.into_iter().flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn children(&self) -> impl Iterator<Item = &Schema> {
        let (map, items) = match &self.kind {
            SchemaKind::Object(map) => (Some(map), None),
            SchemaKind::List(items) => (None, Some(items)),
            _ => (None, None),
        };
        map.into_iter()
            .flat_map(|m| m.values())
            .chain(items.into_iter().flat_map(|l| l.iter()))
    }

    /// Sum of every leaf's strided bytes.
    pub fn total_strided_bytes(&self) -> u64 {
        match &self.kind {
            SchemaKind::Leaf(dtype) => dtype.strided_bytes(),
            _ => self.children().map(Schema::total_strided_bytes).sum(),
        }
    }

    /// Buffer length needed to hold every leaf at its offset.
    pub fn spanned_bytes(&self) -> u64 {
        match &self.kind {
            SchemaKind::Leaf(dtype) => dtype.spanned_bytes(),
            _ => self.children().map(Schema::spanned_bytes).max().unwrap_or(0),
        }
    }

    /// Pack every leaf back to back in depth-first order.
    pub fn compact(&mut self) {
        let mut offset = 0;
        self.compact_from(&mut offset);
    }

    fn compact_from(&mut self, offset: &mut u64) {
        match &mut self.kind {
            SchemaKind::Empty => {}
            SchemaKind::Leaf(dtype) => {
                let mut packed = dtype.compact();
                packed.set_offset(*offset);
                *offset += packed.bytes_compact();
                *dtype = packed;
            }
            SchemaKind::Object(map) => map.values_mut().for_each(|s| s.compact_from(offset)),
            SchemaKind::List(items) => items.iter_mut().for_each(|s| s.compact_from(offset)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_assigns_running_offsets() {
        let mut s = Schema::new();
        *s.fetch("a") = Schema::from_dtype(DataType::int32(3));
        let mut strided = DataType::float64(2);
        strided.set_stride(16);
        *s.fetch("b/c") = Schema::from_dtype(strided);
        assert_eq!(s.total_strided_bytes(), 12 + 32);

        s.compact();
        assert_eq!(s.fetch_existing("a").unwrap().dtype().offset(), 0);
        let c = s.fetch_existing("b/c").unwrap().dtype();
        assert_eq!((c.offset(), c.stride()), (12, 8));
        assert_eq!(s.spanned_bytes(), 28);
    }

    #[test]
    fn lists_and_lookup() {
        let mut s = Schema::new();
        s.append().set_dtype(DataType::uint8(1));
        s.append().set_dtype(DataType::uint8(1));
        assert!(s.is_list());
        assert_eq!(s.number_of_children(), 2);
        assert!(s.fetch_existing("1").unwrap().is_leaf());
        assert!(s.fetch_existing("2").is_err());
    }
}
