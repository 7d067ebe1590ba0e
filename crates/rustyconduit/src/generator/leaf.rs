//! Leaf descriptors: `"float64"` or `{"dtype": "float64", ...}`.

use std::collections::HashSet;

use super::cursor::Cursor;
use super::document::Doc;
use crate::dtype::{DataType, Endianness, TypeId};
use crate::element::{write_num, Num};
use crate::error::{Error, Result};
use crate::node::Node;

/// Mapping entries, rejecting a key that appears twice.
pub(crate) fn unique_members<'a, C: Cursor<'a>>(c: C, path: &str) -> Result<Vec<(&'a str, C)>> {
    let members = c.members();
    let mut seen = HashSet::with_capacity(members.len());
    for (name, _) in &members {
        if !seen.insert(*name) {
            return Err(Error::DuplicateKey {
                key: name.to_string(),
                path: path.to_string(),
            });
        }
    }
    Ok(members)
}

pub(crate) fn member<'a, C: Cursor<'a>>(members: &[(&'a str, C)], name: &str) -> Option<C> {
    members.iter().find(|(k, _)| *k == name).map(|(_, c)| *c)
}

pub(crate) fn uint_field<'a, C: Cursor<'a>>(c: C, path: &str, field: &str) -> Result<u64> {
    match c.number() {
        Some(Num::Int(v)) if v >= 0 => Ok(v as u64),
        Some(Num::UInt(v)) => Ok(v),
        Some(Num::Float(v)) if v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(Error::Protocol(format!(
            "{path}: {field} must be a non-negative integer"
        ))),
    }
}

/// A parsed leaf descriptor.
pub(crate) struct LeafSpec<C> {
    pub dtype: DataType,
    pub value: Option<C>,
    pub address: Option<String>,
}

/// Parse a leaf descriptor. Without an explicit `offset` the leaf starts
/// at `*offset`; either way `*offset` then advances by the leaf's strided
/// bytes. `count_of` turns a `number_of_elements`/`length` entry into a
/// count, so the caller decides how `{"reference": ...}` lengths resolve.
pub(crate) fn parse_leaf<'a, C, F>(c: C, offset: &mut u64, path: &str, count_of: F) -> Result<LeafSpec<C>>
where
    C: Cursor<'a>,
    F: FnOnce(C) -> Result<u64>,
{
    let members = if c.is_object() { unique_members(c, path)? } else { Vec::new() };
    let name_cursor = if c.is_object() { member(&members, "dtype") } else { Some(c) };
    let name = name_cursor
        .and_then(|n| n.text())
        .ok_or_else(|| Error::Protocol(format!("{path}: dtype must be a type name")))?;
    let id = TypeId::from_name(&name)?;
    if id == TypeId::Empty {
        return Ok(LeafSpec {
            dtype: DataType::empty(),
            value: None,
            address: None,
        });
    }

    let value = member(&members, "value");
    let count = match member(&members, "number_of_elements").or_else(|| member(&members, "length")) {
        Some(n) => count_of(n)?,
        None => match value {
            Some(v) => implied_count(id, v, path)?,
            None => 1,
        },
    };

    let natural = id.default_bytes();
    let element_bytes = match member(&members, "element_bytes") {
        Some(e) => uint_field(e, path, "element_bytes")?,
        None => natural,
    };
    if element_bytes < natural {
        return Err(Error::TypeMismatch(format!(
            "{path}: {id} needs {natural} bytes per element, element_bytes is {element_bytes}"
        )));
    }
    let stride = match member(&members, "stride") {
        Some(s) => uint_field(s, path, "stride")?,
        None => element_bytes,
    };
    let leaf_offset = match member(&members, "offset") {
        Some(o) => uint_field(o, path, "offset")?,
        None => *offset,
    };
    let endianness = match member(&members, "endianness") {
        Some(e) => {
            let text = e
                .text()
                .ok_or_else(|| Error::Protocol(format!("{path}: endianness must be a name")))?;
            Endianness::from_name(&text)?
        }
        None => Endianness::Default,
    };
    let address = match member(&members, "address") {
        Some(a) => Some(
            a.text()
                .ok_or_else(|| Error::Protocol(format!("{path}: address must be a hex string")))?,
        ),
        None => None,
    };

    let dtype = DataType::new(id, count, leaf_offset, stride, element_bytes, endianness);
    *offset += dtype.strided_bytes();
    Ok(LeafSpec { dtype, value, address })
}

fn implied_count<'a, C: Cursor<'a>>(id: TypeId, value: C, path: &str) -> Result<u64> {
    if id.is_string() {
        let text = value
            .text()
            .ok_or_else(|| Error::TypeMismatch(format!("{path}: char8_str value must be a string")))?;
        return Ok(text.len() as u64 + 1);
    }
    Ok(match value.doc() {
        Doc::Seq(items) => items.len() as u64,
        _ => 1,
    })
}

/// One literal as a number of kind `id`.
fn literal_number<'a, C: Cursor<'a>>(c: C, id: TypeId, path: &str) -> Result<Num> {
    if let Some(num) = c.number() {
        return Ok(num);
    }
    if let Some(b) = c.boolean() {
        return Ok(Num::Int(i64::from(b)));
    }
    if id.is_float() {
        match c.text().as_deref() {
            Some("nan") => return Ok(Num::Float(f64::NAN)),
            Some("inf") => return Ok(Num::Float(f64::INFINITY)),
            Some("-inf") => return Ok(Num::Float(f64::NEG_INFINITY)),
            _ => {}
        }
    }
    Err(Error::TypeMismatch(format!(
        "{path}: value {:?} is not a valid {id}",
        c.doc()
    )))
}

/// Compact, machine-ordered leaf of `dtype`'s kind and count holding the
/// literal(s) in `value`.
pub(crate) fn literal_leaf<'a, C: Cursor<'a>>(dtype: &DataType, value: C, path: &str) -> Result<Node> {
    let id = dtype.id();
    let n = dtype.number_of_elements();
    let target = DataType::with_defaults(id, n);

    if id.is_string() {
        let text = value
            .text()
            .ok_or_else(|| Error::TypeMismatch(format!("{path}: char8_str value must be a string")))?;
        if text.len() as u64 + 1 > n {
            return Err(Error::TypeMismatch(format!(
                "{path}: string of {} bytes does not fit char8_str[{n}]",
                text.len()
            )));
        }
        let mut bytes = text.into_bytes();
        bytes.resize(n as usize, 0);
        return Node::from_leaf_bytes(target, bytes);
    }

    let literals = if value.is_array() { value.elements() } else { vec![value] };
    if literals.len() as u64 != n {
        return Err(Error::TypeMismatch(format!(
            "{path}: {} values given for {id}[{n}]",
            literals.len()
        )));
    }
    let width = id.default_bytes() as usize;
    let big = Endianness::machine().is_big();
    let mut bytes = vec![0u8; width * literals.len()];
    for (out, literal) in bytes.chunks_exact_mut(width).zip(literals) {
        write_num(id, literal_number(literal, id, path)?, out, big);
    }
    Node::from_leaf_bytes(target, bytes)
}

#[cfg(test)]
mod tests {
    use super::super::cursor::JsonCursor;
    use super::super::document::parse_json;
    use super::*;

    fn leaf(text: &str, offset: &mut u64) -> Result<DataType> {
        let doc = parse_json(text)?;
        parse_leaf(JsonCursor::new(&doc), offset, "x", |n| uint_field(n, "x", "number_of_elements"))
            .map(|s| s.dtype)
    }

    #[test]
    fn bare_names_and_defaults() {
        let mut off = 0;
        let dt = leaf(r#""double""#, &mut off).unwrap();
        assert_eq!(dt, DataType::float64(1));
        assert_eq!(off, 8);
        let dt = leaf(r#"{"dtype": "int16", "number_of_elements": 3}"#, &mut off).unwrap();
        assert_eq!((dt.offset(), dt.stride(), dt.number_of_elements()), (8, 2, 3));
        assert_eq!(off, 14);
    }

    #[test]
    fn count_is_implied_by_value() {
        let mut off = 0;
        let dt = leaf(r#"{"dtype": "uint8", "value": [1, 2, 3, 4]}"#, &mut off).unwrap();
        assert_eq!(dt.number_of_elements(), 4);
        let dt = leaf(r#"{"dtype": "char8_str", "value": "abc"}"#, &mut off).unwrap();
        assert_eq!(dt.number_of_elements(), 4);
    }

    #[test]
    fn bad_descriptors() {
        let mut off = 0;
        assert!(matches!(leaf(r#""float16""#, &mut off), Err(Error::InvalidTypeName(_))));
        assert!(matches!(
            leaf(r#"{"dtype": "int32", "element_bytes": 2}"#, &mut off),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            leaf(r#"{"dtype": "int32", "stride": -4}"#, &mut off),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            leaf(r#"{"dtype": "int32", "dtype": "int64"}"#, &mut off),
            Err(Error::DuplicateKey { .. })
        ));
    }

    #[test]
    fn literal_kinds_are_checked() {
        let doc = parse_json(r#"["a", "b"]"#).unwrap();
        let err = literal_leaf(&DataType::int32(2), JsonCursor::new(&doc), "v").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));

        let doc = parse_json("12").unwrap();
        let err = literal_leaf(&DataType::char8_str(3), JsonCursor::new(&doc), "v").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));

        let doc = parse_json(r#"["nan", 1]"#).unwrap();
        let node = literal_leaf(&DataType::float32(2), JsonCursor::new(&doc), "v").unwrap();
        let v = node.values::<f32>().unwrap();
        assert!(v[0].is_nan());
        assert_eq!(v[1], 1.0);
    }
}
