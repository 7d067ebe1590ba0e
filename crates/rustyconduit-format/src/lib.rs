//! Pure-Rust HDF5 format subset for rustyconduit stores.
//!
//! The low-level modules parse and serialize individual structures
//! (superblock v2/v3, v2 object headers, datatype, dataspace, layout,
//! link and attribute messages, v1 chunk B-trees). [`FileImage`] ties them
//! together into a whole file held in memory.

pub mod attribute;
pub mod btree;
pub mod bytes;
pub mod checksum;
pub mod chunks;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod filter_pipeline;
pub mod hyperslab;
pub mod image;
pub mod layout;
pub mod link;
pub mod message;
pub mod object_header;
pub mod superblock;

pub use attribute::Attribute;
pub use dataspace::{Dataspace, UNLIMITED};
pub use datatype::{ByteOrder, CharacterSet, Datatype, StringPadding};
pub use error::FormatError;
pub use hyperslab::Hyperslab;
pub use image::{Dataset, FileImage, Group, Link, Object, ObjectId, StorageLayout};
pub use rustyconduit_filters::{CodecRegistry, FilterSpec};
