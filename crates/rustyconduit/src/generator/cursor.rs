//! Per-grammar views over a [`Doc`].
//!
//! The walks only ever look at a document through [`Cursor`]. The two
//! grammars differ in how scalars read: JSON strings are never numbers,
//! while YAML scalars are text first and count as numbers whenever they
//! look like one.

use super::document::Doc;
use crate::element::Num;

pub(crate) trait Cursor<'a>: Copy {
    fn new(doc: &'a Doc) -> Self;

    fn doc(self) -> &'a Doc;

    /// Numeric reading of a scalar.
    fn number(self) -> Option<Num>;

    /// Textual reading of a scalar.
    fn text(self) -> Option<String>;

    fn is_object(self) -> bool {
        matches!(self.doc(), Doc::Map(_))
    }

    fn is_array(self) -> bool {
        matches!(self.doc(), Doc::Seq(_))
    }

    fn boolean(self) -> Option<bool> {
        match self.doc() {
            Doc::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Mapping entries in document order, duplicates included.
    fn members(self) -> Vec<(&'a str, Self)> {
        match self.doc() {
            Doc::Map(entries) => entries.iter().map(|(k, v)| (k.as_str(), Self::new(v))).collect(),
            _ => Vec::new(),
        }
    }

    fn elements(self) -> Vec<Self> {
        match self.doc() {
            Doc::Seq(items) => items.iter().map(Self::new).collect(),
            _ => Vec::new(),
        }
    }
}

fn typed_number(doc: &Doc) -> Option<Num> {
    match doc {
        Doc::Int(v) => Some(Num::Int(*v)),
        Doc::UInt(v) => Some(Num::UInt(*v)),
        Doc::Float(v) => Some(Num::Float(*v)),
        _ => None,
    }
}

/// Number spelled as text, e.g. a quoted YAML scalar. Words such as `inf`
/// or `nan` do not count.
pub(crate) fn numeric_text(text: &str) -> Option<Num> {
    let t = text.trim();
    let first = t.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    if let Ok(v) = t.parse::<i64>() {
        return Some(Num::Int(v));
    }
    if let Ok(v) = t.parse::<u64>() {
        return Some(Num::UInt(v));
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite()).map(Num::Float)
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct JsonCursor<'a>(&'a Doc);

impl<'a> Cursor<'a> for JsonCursor<'a> {
    fn new(doc: &'a Doc) -> Self {
        JsonCursor(doc)
    }

    fn doc(self) -> &'a Doc {
        self.0
    }

    fn number(self) -> Option<Num> {
        typed_number(self.0)
    }

    fn text(self) -> Option<String> {
        match self.0 {
            Doc::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct YamlCursor<'a>(&'a Doc);

impl<'a> Cursor<'a> for YamlCursor<'a> {
    fn new(doc: &'a Doc) -> Self {
        YamlCursor(doc)
    }

    fn doc(self) -> &'a Doc {
        self.0
    }

    fn number(self) -> Option<Num> {
        match self.0 {
            Doc::Str(s) => numeric_text(s),
            other => typed_number(other),
        }
    }

    fn text(self) -> Option<String> {
        match self.0 {
            Doc::Str(s) => Some(s.clone()),
            Doc::Int(v) => Some(v.to_string()),
            Doc::UInt(v) => Some(v.to_string()),
            Doc::Float(v) => Some(v.to_string()),
            Doc::Bool(b) => Some(b.to_string()),
            Doc::Null | Doc::Seq(_) | Doc::Map(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_strings_are_never_numbers() {
        let doc = Doc::Str("12".into());
        assert_eq!(JsonCursor::new(&doc).number(), None);
        assert_eq!(YamlCursor::new(&doc).number(), Some(Num::Int(12)));
    }

    #[test]
    fn numeric_text_rules() {
        assert_eq!(numeric_text(" -4 "), Some(Num::Int(-4)));
        assert_eq!(numeric_text("18446744073709551615"), Some(Num::UInt(u64::MAX)));
        assert_eq!(numeric_text(".5"), Some(Num::Float(0.5)));
        assert_eq!(numeric_text("inf"), None);
        assert_eq!(numeric_text("-inf"), None);
        assert_eq!(numeric_text("x1"), None);
        assert_eq!(numeric_text(""), None);
    }

    #[test]
    fn yaml_scalars_read_as_text() {
        let doc = Doc::Int(7);
        assert_eq!(YamlCursor::new(&doc).text().as_deref(), Some("7"));
        assert_eq!(JsonCursor::new(&doc).text(), None);
    }
}
