//! Hierarchical self-describing data.
//!
//! A [`Node`] is empty, a typed leaf, an object of named children or a
//! list of anonymous ones. Leaves are described by a [`DataType`]: element
//! kind, count, byte offset, stride, element size and byte order, so a
//! leaf can view memory laid out by someone else. A [`Schema`] is the same
//! tree without the data.
//!
//! The [`Generator`] builds nodes and schemas from JSON or YAML text in
//! several [`Protocol`]s, and [`Node::to_string_with`] writes them back.
//!
//! ```
//! use rustyconduit::{Node, Protocol};
//!
//! let mut n = Node::new();
//! n.fetch("mesh/coords/x").set_slice(&[0.0f64, 1.0, 2.0]);
//! n.fetch("mesh/name").set_string("line");
//!
//! let text = n.to_string_with(Protocol::ConduitJson).unwrap();
//! let back = Node::parse(&text, "conduit_json").unwrap();
//! assert_eq!(back, n);
//! ```

pub mod dtype;
pub mod element;
mod emit;
pub mod error;
pub mod generator;
pub mod node;
pub mod schema;

pub use dtype::{DataType, Endianness, TypeId};
pub use element::{Element, Num};
pub use error::{Error, Result};
pub use generator::{Generator, Protocol};
pub use node::Node;
pub use schema::Schema;
