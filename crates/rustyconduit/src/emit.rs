//! Text emission in every protocol the generator reads.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Number, Value};

use crate::dtype::DataType;
use crate::element::Num;
use crate::error::{Error, Result};
use crate::generator::Protocol;
use crate::node::Node;
use crate::schema::Schema;

fn num_value(num: Num) -> Value {
    match num {
        Num::Int(v) => Value::from(v),
        Num::UInt(v) => Value::from(v),
        Num::Float(v) => match Number::from_f64(v) {
            Some(n) => Value::Number(n),
            None if v.is_nan() => Value::from("nan"),
            None if v > 0.0 => Value::from("inf"),
            None => Value::from("-inf"),
        },
    }
}

fn leaf_value(node: &Node) -> Value {
    if node.is_string() {
        return Value::from(node.as_string().unwrap_or_default());
    }
    let nums = node.to_num_vec().unwrap_or_default();
    match nums.as_slice() {
        [one] if node.number_of_elements() == 1 => num_value(*one),
        many => Value::Array(many.iter().copied().map(num_value).collect()),
    }
}

fn pure_value(node: &Node) -> Value {
    if node.is_object() {
        Value::Object(node.entries().map(|(k, v)| (k.to_string(), pure_value(v))).collect())
    } else if node.is_list() {
        Value::Array(node.children().map(pure_value).collect())
    } else if node.is_leaf() {
        leaf_value(node)
    } else {
        Value::Null
    }
}

fn dtype_value(dtype: &DataType) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("dtype".into(), Value::from(dtype.name()));
    map.insert("number_of_elements".into(), Value::from(dtype.number_of_elements()));
    map.insert("offset".into(), Value::from(dtype.offset()));
    map.insert("stride".into(), Value::from(dtype.stride()));
    map.insert("element_bytes".into(), Value::from(dtype.element_bytes()));
    map.insert("endianness".into(), Value::from(dtype.endianness().resolve().name()));
    map
}

fn empty_value() -> Value {
    let mut map = Map::new();
    map.insert("dtype".into(), Value::from("empty"));
    Value::Object(map)
}

/// Schema text for `node` packed with running offsets, with or without
/// inline values.
fn conduit_value(node: &Node, offset: &mut u64, with_values: bool) -> Value {
    if node.is_object() {
        Value::Object(
            node.entries()
                .map(|(k, v)| (k.to_string(), conduit_value(v, offset, with_values)))
                .collect(),
        )
    } else if node.is_list() {
        Value::Array(node.children().map(|c| conduit_value(c, offset, with_values)).collect())
    } else if node.is_leaf() {
        let mut dtype = node.dtype().compact();
        dtype.set_offset(*offset);
        *offset += dtype.bytes_compact();
        let mut map = dtype_value(&dtype);
        if with_values {
            map.insert("value".into(), leaf_value(node));
        }
        Value::Object(map)
    } else {
        empty_value()
    }
}

fn schema_value(schema: &Schema) -> Value {
    if schema.is_object() {
        Value::Object(schema.entries().map(|(k, v)| (k.to_string(), schema_value(v))).collect())
    } else if schema.is_list() {
        Value::Array(schema.children().map(schema_value).collect())
    } else if schema.is_leaf() {
        Value::Object(dtype_value(&schema.dtype()))
    } else {
        empty_value()
    }
}

fn base64_value(node: &Node) -> Value {
    let mut data = Map::new();
    data.insert("base64".into(), Value::from(STANDARD.encode(node.compact_bytes())));
    let mut envelope = Map::new();
    envelope.insert("schema".into(), conduit_value(node, &mut 0, false));
    envelope.insert("data".into(), Value::Object(data));
    Value::Object(envelope)
}

fn yaml(value: &Value) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| Error::Usage(format!("yaml emission failed: {e}")))
}

impl Node {
    /// Render in any of the generator's protocols.
    pub fn to_string_with(&self, protocol: Protocol) -> Result<String> {
        let value = match protocol {
            Protocol::Json | Protocol::Yaml => pure_value(self),
            Protocol::ConduitJson | Protocol::ConduitYaml => conduit_value(self, &mut 0, true),
            Protocol::ConduitBase64Json | Protocol::ConduitBase64Yaml => base64_value(self),
        };
        match protocol {
            Protocol::Json | Protocol::ConduitJson | Protocol::ConduitBase64Json => Ok(format!("{value:#}")),
            Protocol::Yaml | Protocol::ConduitYaml | Protocol::ConduitBase64Yaml => yaml(&value),
        }
    }

    /// Plain JSON: objects, arrays, numbers and strings only.
    pub fn to_json(&self) -> String {
        format!("{:#}", pure_value(self))
    }

    pub fn to_yaml(&self) -> Result<String> {
        yaml(&pure_value(self))
    }
}

impl Schema {
    /// Schema text with this schema's own offsets and strides.
    pub fn to_json(&self) -> String {
        format!("{:#}", schema_value(self))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}
