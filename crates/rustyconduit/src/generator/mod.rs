//! Text to [`Node`] / [`Schema`].
//!
//! A [`Generator`] pairs a document with the [`Protocol`] it is written
//! in. Documents are parsed once into an owned tree that keeps duplicate
//! keys, then walked through the grammar's [`Cursor`](cursor::Cursor).

mod cursor;
mod document;
mod leaf;
mod walk;

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use self::cursor::{Cursor, JsonCursor, YamlCursor};
use self::document::{parse_json, parse_yaml, Doc};
use self::leaf::{member, unique_members};
use self::walk::{walk_data, walk_layout, walk_pure, DataWalk, Source};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::schema::Schema;

/// Text encodings understood by [`Generator`] and emitted by
/// [`Node::to_string_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Json,
    Yaml,
    ConduitJson,
    ConduitYaml,
    ConduitBase64Json,
    ConduitBase64Yaml,
}

impl Protocol {
    pub const ALL: [Protocol; 6] = [
        Protocol::Json,
        Protocol::Yaml,
        Protocol::ConduitJson,
        Protocol::ConduitYaml,
        Protocol::ConduitBase64Json,
        Protocol::ConduitBase64Yaml,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Protocol::Json => "json",
            Protocol::Yaml => "yaml",
            Protocol::ConduitJson => "conduit_json",
            Protocol::ConduitYaml => "conduit_yaml",
            Protocol::ConduitBase64Json => "conduit_base64_json",
            Protocol::ConduitBase64Yaml => "conduit_base64_yaml",
        }
    }

    pub fn is_yaml(self) -> bool {
        matches!(
            self,
            Protocol::Yaml | Protocol::ConduitYaml | Protocol::ConduitBase64Yaml
        )
    }

    fn is_pure(self) -> bool {
        matches!(self, Protocol::Json | Protocol::Yaml)
    }

    fn is_base64(self) -> bool {
        matches!(self, Protocol::ConduitBase64Json | Protocol::ConduitBase64Yaml)
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Protocol> {
        Protocol::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::Protocol(format!("unknown protocol {s:?}")))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses one document in one protocol.
///
/// ```
/// use rustyconduit::{Generator, Node, Protocol};
///
/// let mut node = Node::new();
/// Generator::new(r#"{"a": {"dtype": "int32", "value": 7}}"#, Protocol::ConduitJson)
///     .walk(&mut node)
///     .unwrap();
/// assert_eq!(node.fetch_existing("a").unwrap().value::<i32>().unwrap(), 7);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Generator<'a> {
    text: &'a str,
    protocol: Protocol,
    data: Option<&'a [u8]>,
}

impl<'a> Generator<'a> {
    pub fn new(text: &'a str, protocol: Protocol) -> Self {
        Generator {
            text,
            protocol,
            data: None,
        }
    }

    /// Leaves are copied out of `data` at their schema offsets instead of
    /// being read from inline values. Only meaningful for the `conduit_json`
    /// and `conduit_yaml` protocols.
    pub fn with_data(mut self, data: &'a [u8]) -> Self {
        self.data = Some(data);
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Replace `node` with the document's tree. On error `node` is left
    /// empty.
    pub fn walk(&self, node: &mut Node) -> Result<()> {
        let source = match self.data {
            Some(data) => Source::Copy(data),
            None => Source::Inline,
        };
        self.finish(node, self.build(source))
    }

    /// Bind every leaf to caller memory at its schema offset; `address`
    /// entries bind to the address they name.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes, and every
    /// `address` in the document must be valid for its leaf's span, for as
    /// long as `node` is used.
    pub unsafe fn walk_external(&self, node: &mut Node, ptr: *mut u8, len: usize) -> Result<()> {
        self.finish(node, self.build(Source::External { ptr, len }))
    }

    /// The layout the document describes, without data.
    pub fn walk_schema(&self, schema: &mut Schema) -> Result<()> {
        debug!(protocol = %self.protocol, "generating schema");
        match self.build_schema() {
            Ok(built) => {
                *schema = built;
                Ok(())
            }
            Err(e) => {
                *schema = Schema::new();
                Err(e)
            }
        }
    }

    fn finish(&self, node: &mut Node, result: Result<Node>) -> Result<()> {
        match result {
            Ok(built) => {
                *node = built;
                Ok(())
            }
            Err(e) => {
                debug!(protocol = %self.protocol, error = %e, "generation failed");
                node.reset();
                Err(e)
            }
        }
    }

    fn build_schema(&self) -> Result<Schema> {
        if self.protocol.is_pure() {
            return self.build(Source::Inline).map(|n| n.compact_schema());
        }
        if self.protocol.is_yaml() {
            self.layout::<YamlCursor<'_>>(&parse_yaml(self.text)?)
        } else {
            self.layout::<JsonCursor<'_>>(&parse_json(self.text)?)
        }
    }

    fn build(&self, source: Source<'_>) -> Result<Node> {
        debug!(protocol = %self.protocol, bytes = self.text.len(), "generating node");
        let doc = if self.protocol.is_yaml() {
            parse_yaml(self.text)?
        } else {
            parse_json(self.text)?
        };
        if self.protocol.is_yaml() {
            self.build_with::<YamlCursor<'_>>(&doc, source)
        } else {
            self.build_with::<JsonCursor<'_>>(&doc, source)
        }
    }

    fn build_with<'d, C: Cursor<'d>>(&self, doc: &'d Doc, source: Source<'_>) -> Result<Node> {
        let root = C::new(doc);
        if self.protocol.is_pure() {
            return walk_pure(root, "");
        }
        if self.protocol.is_base64() {
            let (schema, data) = envelope(root)?;
            return walk_data(schema, &mut DataWalk::new(Source::Copy(&data)), None, "");
        }
        walk_data(root, &mut DataWalk::new(source), None, "")
    }

    fn layout<'d, C: Cursor<'d>>(&self, doc: &'d Doc) -> Result<Schema> {
        let mut root = C::new(doc);
        if self.protocol.is_base64() {
            root = envelope(root)?.0;
        }
        walk_layout(root, &mut 0, "")
    }
}

/// Split a `conduit_base64_*` document into its schema and decoded bytes.
fn envelope<'d, C: Cursor<'d>>(root: C) -> Result<(C, Vec<u8>)> {
    let members = unique_members(root, "")?;
    let schema = member(&members, "schema")
        .ok_or_else(|| Error::Protocol("base64 document has no \"schema\" entry".into()))?;
    let encoded = member(&members, "data")
        .filter(|d| d.is_object())
        .map(|d| unique_members(d, "data"))
        .transpose()?
        .and_then(|data| member(&data, "base64"))
        .and_then(|b| match b.doc() {
            Doc::Str(s) => Some(s.as_str()),
            _ => None,
        })
        .ok_or_else(|| Error::Protocol("base64 document has no \"data/base64\" string".into()))?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Protocol(format!("data/base64 does not decode: {e}")))?;
    Ok((schema, bytes))
}

impl Node {
    /// Parse `text` in the protocol named `protocol`.
    pub fn parse(text: &str, protocol: &str) -> Result<Node> {
        let mut node = Node::new();
        Generator::new(text, protocol.parse()?).walk(&mut node)?;
        Ok(node)
    }
}

impl Schema {
    /// Parse the layout of a schema document.
    pub fn parse(text: &str, protocol: &str) -> Result<Schema> {
        let mut schema = Schema::new();
        Generator::new(text, protocol.parse()?).walk_schema(&mut schema)?;
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{DataType, TypeId};

    fn parse(text: &str, protocol: Protocol) -> Result<Node> {
        let mut node = Node::new();
        Generator::new(text, protocol).walk(&mut node)?;
        Ok(node)
    }

    #[test]
    fn protocol_names_round_trip() {
        for p in Protocol::ALL {
            assert_eq!(p.name().parse::<Protocol>().unwrap(), p);
        }
        assert!(matches!("xml".parse::<Protocol>(), Err(Error::Protocol(_))));
    }

    #[test]
    fn pure_json_scalars_and_arrays() {
        let n = parse(
            r#"{"i": 3, "f": 2.5, "s": "txt", "b": true, "z": null, "a": [1, 2, 3], "m": [1, "x"]}"#,
            Protocol::Json,
        )
        .unwrap();
        assert_eq!(n.fetch_existing("i").unwrap().dtype().id(), TypeId::Int64);
        assert_eq!(n.fetch_existing("f").unwrap().to_f64().unwrap(), 2.5);
        assert_eq!(n.fetch_existing("s").unwrap().as_string().unwrap(), "txt");
        assert_eq!(n.fetch_existing("b").unwrap().value::<u8>().unwrap(), 1);
        assert!(n.fetch_existing("z").unwrap().is_empty());
        assert_eq!(n.fetch_existing("a").unwrap().values::<i64>().unwrap(), vec![1, 2, 3]);
        assert!(n.fetch_existing("m").unwrap().is_list());
    }

    #[test]
    fn yaml_numeric_strings_count_as_numbers() {
        let n = parse("a: ['1', 2]\nb: '2.5'\n", Protocol::Yaml).unwrap();
        assert_eq!(n.fetch_existing("a").unwrap().values::<i64>().unwrap(), vec![1, 2]);
        assert_eq!(n.fetch_existing("b").unwrap().to_f64().unwrap(), 2.5);

        let n = parse(r#"{"a": ["1", 2]}"#, Protocol::Json).unwrap();
        assert!(n.fetch_existing("a").unwrap().is_list());
    }

    #[test]
    fn schema_with_inline_values() {
        let n = parse(
            r#"{"x": {"dtype": "float32", "number_of_elements": 2, "value": [1.5, -2]},
                "s": {"dtype": "char8_str", "value": "hey"},
                "e": "empty"}"#,
            Protocol::ConduitJson,
        )
        .unwrap();
        assert_eq!(n.fetch_existing("x").unwrap().values::<f32>().unwrap(), vec![1.5, -2.0]);
        assert_eq!(n.fetch_existing("s").unwrap().as_string().unwrap(), "hey");
        assert!(n.fetch_existing("e").unwrap().is_empty());
    }

    #[test]
    fn copying_walk_reads_offsets_and_strides() {
        let mut data = Vec::new();
        for v in [1i32, 99, 2, 99] {
            data.extend_from_slice(&v.to_ne_bytes());
        }
        data.extend_from_slice(&7.25f64.to_ne_bytes());
        let schema = r#"{"a": {"dtype": "int32", "number_of_elements": 2, "stride": 8},
                         "b": {"dtype": "float64", "offset": 16}}"#;
        let mut n = Node::new();
        Generator::new(schema, Protocol::ConduitJson)
            .with_data(&data)
            .walk(&mut n)
            .unwrap();
        assert_eq!(n.fetch_existing("a").unwrap().values::<i32>().unwrap(), vec![1, 2]);
        assert_eq!(n.fetch_existing("b").unwrap().to_f64().unwrap(), 7.25);
        assert!(n.fetch_existing("a").unwrap().dtype().is_compact());
    }

    #[test]
    fn copying_walk_checks_the_buffer() {
        let mut n = Node::new();
        let err = Generator::new(r#"{"a": {"dtype": "int64", "number_of_elements": 4}}"#, Protocol::ConduitJson)
            .with_data(&[0u8; 8])
            .walk(&mut n)
            .unwrap_err();
        assert!(matches!(err, Error::Layout(_)));
    }

    #[test]
    fn external_walk_aliases_memory() {
        let mut buf = vec![0u8; 16];
        let mut n = Node::new();
        let schema = r#"{"a": "int64", "b": "int64"}"#;
        unsafe {
            Generator::new(schema, Protocol::ConduitJson)
                .walk_external(&mut n, buf.as_mut_ptr(), buf.len())
                .unwrap();
        }
        n.fetch("b").update(&{
            let mut v = Node::new();
            v.set(42i64);
            v
        });
        assert!(n.fetch_existing("b").unwrap().is_external());
        drop(n);
        assert_eq!(i64::from_ne_bytes(buf[8..16].try_into().unwrap()), 42);
    }

    #[test]
    fn address_needs_an_external_walk() {
        let err = parse(r#"{"a": {"dtype": "int8", "address": "0x1000"}}"#, Protocol::ConduitJson)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn list_of_with_literal_and_reference_lengths() {
        let n = parse(
            r#"{"count": {"dtype": "int32", "value": 3},
                "items": {"dtype": {"x": "float64", "y": "float64"}, "length": {"reference": "count"}},
                "pair": {"dtype": {"k": "int8"}, "length": 2}}"#,
            Protocol::ConduitJson,
        )
        .unwrap();
        let items = n.fetch_existing("items").unwrap();
        assert!(items.is_list());
        assert_eq!(items.number_of_children(), 3);
        assert!(items.fetch_existing("2/y").unwrap().is_number());
        assert_eq!(n.fetch_existing("pair").unwrap().number_of_children(), 2);
    }

    #[test]
    fn references_climb_with_dotdot() {
        let n = parse(
            r#"{"n": {"dtype": "uint8", "value": 2},
                "inner": {"list": {"dtype": "int16", "length": {"reference": "../n"}}}}"#,
            Protocol::ConduitJson,
        )
        .unwrap();
        let leaf = n.fetch_existing("inner/list").unwrap();
        assert_eq!(leaf.dtype().id(), TypeId::Int16);
        assert_eq!(leaf.dtype().number_of_elements(), 2);
        assert_eq!(leaf.number_of_children(), 0);
    }

    #[test]
    fn leaf_lengths_follow_references() {
        let n = parse(
            r#"{"n": {"dtype": "int64", "value": 3},
                "v": {"dtype": "float32", "length": {"reference": "n"}},
                "w": {"dtype": "uint8", "number_of_elements": {"reference": "n"}, "value": [7, 8, 9]}}"#,
            Protocol::ConduitJson,
        )
        .unwrap();
        let v = n.fetch_existing("v").unwrap().dtype();
        assert_eq!((v.id(), v.number_of_elements()), (TypeId::Float32, 3));
        assert_eq!(n.fetch_existing("w").unwrap().values::<u8>().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn forward_references_are_rejected() {
        let err = parse(
            r#"{"items": {"dtype": "int8", "length": {"reference": "count"}},
                "count": {"dtype": "int32", "value": 3}}"#,
            Protocol::ConduitJson,
        )
        .unwrap_err();
        assert!(matches!(&err, Error::Protocol(m) if m.contains("already parsed")), "{err}");
    }

    #[test]
    fn base64_envelope() {
        let mut src = Node::new();
        src.fetch("a").set_slice(&[1u16, 2, 3]);
        src.fetch("b/c").set_string("deep");
        let text = src.to_string_with(Protocol::ConduitBase64Yaml).unwrap();
        let back = parse(&text, Protocol::ConduitBase64Yaml).unwrap();
        assert_eq!(back.diff(&src), None);

        let err = parse(r#"{"schema": "int8"}"#, Protocol::ConduitBase64Json).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        let err = parse(r#"{"data": {"base64": ""}}"#, Protocol::ConduitBase64Json).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn schema_walks() {
        let mut s = Schema::new();
        Generator::new(
            r#"{"a": {"dtype": "int32", "number_of_elements": 4}, "b": "float64"}"#,
            Protocol::ConduitJson,
        )
        .walk_schema(&mut s)
        .unwrap();
        assert_eq!(s.fetch_existing("b").unwrap().dtype().offset(), 16);
        assert_eq!(s.total_strided_bytes(), 24);

        Generator::new(r#"{"v": [1, 2]}"#, Protocol::Json)
            .walk_schema(&mut s)
            .unwrap();
        assert_eq!(s.fetch_existing("v").unwrap().dtype(), DataType::int64(2));

        let err = Generator::new(
            r#"{"l": {"dtype": "int8", "length": {"reference": "n"}}}"#,
            Protocol::ConduitJson,
        )
        .walk_schema(&mut s)
        .unwrap_err();
        assert!(matches!(&err, Error::Protocol(m) if m.contains("without data")), "{err}");
        assert!(s.is_empty());
    }

    #[test]
    fn failures_leave_the_node_empty() {
        let mut n = Node::new();
        n.fetch("stale").set(1i8);
        let err = Generator::new(r#"{"a": "int8", "b": "float16"}"#, Protocol::ConduitJson)
            .walk(&mut n)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTypeName(_)));
        assert!(n.is_empty());

        let err = Generator::new("{\"a\": [1,\n", Protocol::Json).walk(&mut n).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
        assert!(n.is_empty());
    }
}
