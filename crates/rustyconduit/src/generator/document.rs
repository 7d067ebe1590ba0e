//! Grammar-neutral document tree.
//!
//! Both grammars deserialize into [`Doc`]. Mappings keep every entry in
//! document order, duplicates included, so the walks can reject them
//! instead of letting the grammar engine pick one.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Doc {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
    Seq(Vec<Doc>),
    Map(Vec<(String, Doc)>),
}

impl Doc {
    /// Scalar rendered as text, used for non-string mapping keys.
    fn key_text(self) -> Option<String> {
        Some(match self {
            Doc::Null => "null".into(),
            Doc::Bool(b) => b.to_string(),
            Doc::Int(v) => v.to_string(),
            Doc::UInt(v) => v.to_string(),
            Doc::Float(v) => v.to_string(),
            Doc::Str(s) => s,
            Doc::Seq(_) | Doc::Map(_) => return None,
        })
    }
}

struct DocVisitor;

impl<'de> Visitor<'de> for DocVisitor {
    type Value = Doc;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON or YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Doc, E> {
        Ok(Doc::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Doc, E> {
        Ok(Doc::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Doc, E> {
        Ok(match i64::try_from(v) {
            Ok(v) => Doc::Int(v),
            Err(_) => Doc::UInt(v),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Doc, E> {
        Ok(Doc::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Doc, E> {
        Ok(Doc::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Doc, E> {
        Ok(Doc::Str(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Doc, E> {
        Ok(Doc::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Doc, E> {
        Ok(Doc::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Doc, D::Error> {
        Doc::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Doc, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Doc::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Doc, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<Doc, Doc>()? {
            let key = key
                .key_text()
                .ok_or_else(|| de::Error::custom("mapping keys must be scalars"))?;
            entries.push((key, value));
        }
        Ok(Doc::Map(entries))
    }
}

impl<'de> Deserialize<'de> for Doc {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Doc, D::Error> {
        d.deserialize_any(DocVisitor)
    }
}

/// Byte offset of 1-based `line`/`column` in `text`.
fn offset_of(text: &str, line: usize, column: usize) -> usize {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(text.len())
}

pub(crate) fn parse_json(text: &str) -> Result<Doc> {
    serde_json::from_str(text).map_err(|e| Error::Parse {
        line: e.line(),
        column: e.column(),
        offset: offset_of(text, e.line(), e.column()),
        message: e.to_string(),
    })
}

pub(crate) fn parse_yaml(text: &str) -> Result<Doc> {
    serde_yaml::from_str(text).map_err(|e| {
        let (line, column, offset) = match e.location() {
            Some(at) => (at.line(), at.column(), at.index()),
            None => (0, 0, 0),
        };
        Error::Parse {
            line,
            column,
            offset,
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_are_preserved() {
        let doc = parse_json(r#"{"a": 1, "a": 2}"#).unwrap();
        assert_eq!(
            doc,
            Doc::Map(vec![("a".into(), Doc::Int(1)), ("a".into(), Doc::Int(2))])
        );
    }

    #[test]
    fn large_unsigned_integers_stay_exact() {
        assert_eq!(parse_json("18446744073709551615").unwrap(), Doc::UInt(u64::MAX));
        assert_eq!(parse_yaml("-3").unwrap(), Doc::Int(-3));
    }

    #[test]
    fn shortest_float_text_parses_back_exactly() {
        for v in [-3.599940107761406e269f64, 1.0e-300, 0.1 + 0.2, f64::MAX, f64::MIN_POSITIVE] {
            let text = format!("{v:e}");
            assert_eq!(parse_json(&text).unwrap(), Doc::Float(v), "{text}");
        }
    }

    #[test]
    fn yaml_keys_may_be_numbers() {
        let doc = parse_yaml("1: one\ntrue: yes\n").unwrap();
        let Doc::Map(entries) = doc else { panic!("expected a map") };
        assert_eq!(entries[0].0, "1");
        assert_eq!(entries[1].0, "true");
    }

    #[test]
    fn json_errors_carry_positions() {
        let err = parse_json("{\n  \"a\": 1,\n  \"b\" 2\n}").unwrap_err();
        let Error::Parse { line, column, offset, .. } = err else { panic!("expected a parse error") };
        assert_eq!(line, 3);
        assert!(column > 0);
        assert_eq!(offset, "{\n  \"a\": 1,\n".len() + column - 1);
    }

    #[test]
    fn yaml_errors_carry_positions() {
        let err = parse_yaml("a: [1, 2\nb: 3\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line, .. } if line >= 1));
    }
}
