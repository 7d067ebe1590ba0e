//! The structural walks, written once over [`Cursor`].
//!
//! * [`walk_pure`]: plain JSON/YAML values.
//! * [`walk_layout`]: schema text to a [`Schema`].
//! * [`walk_data`]: schema text to a [`Node`], with leaf bytes coming from
//!   inline values, a copied buffer or bound caller memory.
//!
//! Nodes are built bottom-up and attached to their parent only once
//! complete, so a `list_of` length can look at the siblings that were
//! already built through a [`Scope`] chain.

use indexmap::IndexMap;
use tracing::trace;

use super::cursor::Cursor;
use super::document::Doc;
use super::leaf::{literal_leaf, member, parse_leaf, uint_field, unique_members, LeafSpec};
use crate::element::Num;
use crate::error::{join_path, Error, Result};
use crate::node::Node;
use crate::schema::Schema;

// ----------------------------------------------------------------------
// pure values
// ----------------------------------------------------------------------

pub(crate) fn walk_pure<'a, C: Cursor<'a>>(c: C, path: &str) -> Result<Node> {
    match c.doc() {
        Doc::Map(_) => {
            let members = unique_members(c, path)?;
            let mut children = IndexMap::with_capacity(members.len());
            for (name, member) in members {
                children.insert(name.to_string(), walk_pure(member, &join_path(path, name))?);
            }
            Ok(Node::from_object(children))
        }
        Doc::Seq(_) => {
            let items = c.elements();
            if items.is_empty() {
                return Ok(Node::new());
            }
            if let Some(nums) = items.iter().map(|i| i.number()).collect::<Option<Vec<Num>>>() {
                return Ok(numeric_array(&nums));
            }
            let mut children = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                children.push(walk_pure(item, &join_path(path, &i.to_string()))?);
            }
            Ok(Node::from_list(children))
        }
        _ => Ok(pure_scalar(c)),
    }
}

/// int64 when every element is a signed integer, else float64.
fn numeric_array(nums: &[Num]) -> Node {
    let mut node = Node::new();
    if nums.iter().all(|n| matches!(n, Num::Int(_))) {
        node.set_slice(&nums.iter().map(|n| n.as_i64()).collect::<Vec<_>>());
    } else {
        node.set_slice(&nums.iter().map(|n| n.as_f64()).collect::<Vec<_>>());
    }
    node
}

fn pure_scalar<'a, C: Cursor<'a>>(c: C) -> Node {
    let mut node = Node::new();
    match (c.number(), c.doc()) {
        (Some(Num::Int(v)), _) => node.set(v),
        (Some(Num::UInt(v)), _) => node.set(v),
        (Some(Num::Float(v)), _) => node.set(v),
        (None, Doc::Bool(b)) => node.set(u8::from(*b)),
        (None, Doc::Str(s)) => node.set_string(s),
        _ => {}
    }
    node
}

// ----------------------------------------------------------------------
// schema documents
// ----------------------------------------------------------------------

enum Shape<'a, C> {
    Leaf(C),
    ListOf { element: C, length: Option<C> },
    Object(Vec<(&'a str, C)>),
    List(Vec<C>),
}

fn classify<'a, C: Cursor<'a>>(c: C, path: &str) -> Result<Shape<'a, C>> {
    match c.doc() {
        Doc::Map(_) => {
            let members = unique_members(c, path)?;
            Ok(match member(&members, "dtype") {
                Some(dt) if dt.is_object() => Shape::ListOf {
                    element: dt,
                    length: member(&members, "length"),
                },
                Some(_) => Shape::Leaf(c),
                None => Shape::Object(members),
            })
        }
        Doc::Seq(_) => Ok(Shape::List(c.elements())),
        Doc::Str(_) => Ok(Shape::Leaf(c)),
        other => Err(Error::Protocol(format!(
            "{}: expected a dtype name, a leaf descriptor, an object or a list, found {other:?}",
            display(path)
        ))),
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Already-built children of one container on the path being walked.
pub(crate) struct Scope<'s> {
    built: Built<'s>,
    parent: Option<&'s Scope<'s>>,
}

enum Built<'s> {
    Object(&'s IndexMap<String, Node>),
    List(&'s [Node]),
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Option<&Node> {
        match self.built {
            Built::Object(map) => map.get(name),
            Built::List(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
        }
    }
}

/// Resolve a `reference` against the siblings in `scope`; each leading
/// `..` climbs one level.
fn resolve_reference<'s>(scope: Option<&'s Scope<'s>>, reference: &str, path: &str) -> Result<&'s Node> {
    let unresolved = || {
        Error::Protocol(format!(
            "{}: reference {reference:?} does not name an already parsed node",
            display(path)
        ))
    };
    let mut segments = reference
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .peekable();
    let mut level = scope;
    while segments.peek() == Some(&"..") {
        segments.next();
        level = level.and_then(|s| s.parent);
    }
    let first = segments.next().ok_or_else(unresolved)?;
    let node = level.and_then(|s| s.lookup(first)).ok_or_else(unresolved)?;
    let rest: Vec<&str> = segments.collect();
    node.fetch_existing(&rest.join("/")).map_err(|_| unresolved())
}

fn list_length<'a, C: Cursor<'a>>(length: Option<C>, scope: Option<&Scope<'_>>, resolve: bool, path: &str) -> Result<u64> {
    let length =
        length.ok_or_else(|| Error::Protocol(format!("{}: list_of needs a length", display(path))))?;
    length_value(length, scope, resolve, path)
}

/// A literal count or a `{"reference": ...}` to an earlier integer leaf.
/// Without data (`resolve == false`) references are an error.
fn length_value<'a, C: Cursor<'a>>(length: C, scope: Option<&Scope<'_>>, resolve: bool, path: &str) -> Result<u64> {
    if !length.is_object() {
        return uint_field(length, path, "length");
    }
    let members = unique_members(length, path)?;
    let reference = member(&members, "reference")
        .and_then(|r| r.text())
        .ok_or_else(|| Error::Protocol(format!("{}: length must be a count or a reference", display(path))))?;
    if !resolve {
        return Err(Error::Protocol(format!(
            "{}: reference {reference:?} cannot be resolved without data",
            display(path)
        )));
    }
    let target = resolve_reference(scope, &reference, path)?;
    let count = target
        .to_i64()
        .map_err(|e| Error::Protocol(format!("{}: reference {reference:?}: {e}", display(path))))?;
    u64::try_from(count)
        .map_err(|_| Error::Protocol(format!("{}: reference {reference:?} is negative", display(path))))
}

pub(crate) fn walk_layout<'a, C: Cursor<'a>>(c: C, offset: &mut u64, path: &str) -> Result<Schema> {
    match classify(c, path)? {
        Shape::Leaf(c) => {
            let spec = parse_leaf(c, offset, path, |n| length_value(n, None, false, path))?;
            Ok(Schema::from_dtype(spec.dtype))
        }
        Shape::ListOf { element, length } => {
            let count = list_length(length, None, false, path)?;
            let mut items = Vec::new();
            for i in 0..count {
                items.push(walk_layout(element, offset, &join_path(path, &i.to_string()))?);
            }
            Ok(Schema::from_list(items))
        }
        Shape::Object(members) => {
            let mut children = IndexMap::with_capacity(members.len());
            for (name, member) in members {
                children.insert(name.to_string(), walk_layout(member, offset, &join_path(path, name))?);
            }
            Ok(Schema::from_object(children))
        }
        Shape::List(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for (i, element) in elements.into_iter().enumerate() {
                items.push(walk_layout(element, offset, &join_path(path, &i.to_string()))?);
            }
            Ok(Schema::from_list(items))
        }
    }
}

/// Where leaf bytes come from during [`walk_data`].
#[derive(Clone, Copy)]
pub(crate) enum Source<'d> {
    /// Zero-filled, then `value` literals.
    Inline,
    /// Copied out of a buffer at each leaf's offset.
    Copy(&'d [u8]),
    /// Bound to caller memory at each leaf's offset.
    External { ptr: *mut u8, len: usize },
}

pub(crate) struct DataWalk<'d> {
    source: Source<'d>,
    offset: u64,
}

impl<'d> DataWalk<'d> {
    pub(crate) fn new(source: Source<'d>) -> Self {
        DataWalk { source, offset: 0 }
    }

    fn bind<'a, C: Cursor<'a>>(&self, spec: LeafSpec<C>, path: &str) -> Result<Node> {
        let dtype = spec.dtype;
        if dtype.is_empty() {
            return Ok(Node::new());
        }
        let mut node = match (spec.address, self.source) {
            (Some(address), Source::External { .. }) => {
                let ptr = parse_address(&address, path)?;
                trace!(path, address = %address, "binding leaf to document address");
                // SAFETY: `walk_external` callers vouch for every address in
                // the document.
                unsafe { Node::external_leaf(dtype, ptr, dtype.spanned_bytes() as usize)? }
            }
            (Some(_), _) => {
                return Err(Error::Protocol(format!(
                    "{}: address bindings need an external walk",
                    display(path)
                )))
            }
            (None, Source::Inline) => Node::from_dtype(dtype),
            (None, Source::Copy(data)) => {
                if dtype.spanned_bytes() > data.len() as u64 {
                    return Err(Error::Layout(format!(
                        "{}: {dtype} needs {} bytes, data holds {}",
                        display(path),
                        dtype.spanned_bytes(),
                        data.len()
                    )));
                }
                let mut node = Node::new();
                node.set_data_using_schema(&Schema::from_dtype(dtype), data)?;
                node
            }
            // SAFETY: `walk_external` callers guarantee `ptr..ptr+len`.
            (None, Source::External { ptr, len }) => unsafe { Node::external_leaf(dtype, ptr, len)? },
        };
        if let Some(value) = spec.value {
            node.update(&literal_leaf(&dtype, value, path)?);
        }
        Ok(node)
    }
}

fn parse_address(text: &str, path: &str) -> Result<*mut u8> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let addr = usize::from_str_radix(digits, 16)
        .map_err(|_| Error::Protocol(format!("{}: bad address {text:?}", display(path))))?;
    Ok(addr as *mut u8)
}

pub(crate) fn walk_data<'a, C: Cursor<'a>>(
    c: C,
    walk: &mut DataWalk<'_>,
    scope: Option<&Scope<'_>>,
    path: &str,
) -> Result<Node> {
    match classify(c, path)? {
        Shape::Leaf(c) => {
            let spec = parse_leaf(c, &mut walk.offset, path, |n| length_value(n, scope, true, path))?;
            walk.bind(spec, path)
        }
        Shape::ListOf { element, length } => {
            let count = list_length(length, scope, true, path)?;
            let mut items: Vec<Node> = Vec::new();
            for i in 0..count {
                let child = {
                    let level = Scope {
                        built: Built::List(&items),
                        parent: scope,
                    };
                    walk_data(element, walk, Some(&level), &join_path(path, &i.to_string()))?
                };
                items.push(child);
            }
            Ok(Node::from_list(items))
        }
        Shape::Object(members) => {
            let mut children = IndexMap::with_capacity(members.len());
            for (name, member) in members {
                let child = {
                    let level = Scope {
                        built: Built::Object(&children),
                        parent: scope,
                    };
                    walk_data(member, walk, Some(&level), &join_path(path, name))?
                };
                children.insert(name.to_string(), child);
            }
            Ok(Node::from_object(children))
        }
        Shape::List(elements) => {
            let mut items: Vec<Node> = Vec::with_capacity(elements.len());
            for (i, element) in elements.into_iter().enumerate() {
                let child = {
                    let level = Scope {
                        built: Built::List(&items),
                        parent: scope,
                    };
                    walk_data(element, walk, Some(&level), &join_path(path, &i.to_string()))?
                };
                items.push(child);
            }
            Ok(Node::from_list(items))
        }
    }
}
