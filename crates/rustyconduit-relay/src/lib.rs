//! HDF5 transcoding for rustyconduit node trees.
//!
//! Objects become groups, lists become groups carrying the
//! [`LIST_MARKER`] attribute, and leaves become one-dimensional datasets of
//! the matching native type. Writes are checked against what is already
//! stored before anything changes. Reads and writes accept offset, stride
//! and size windows through [`SlabOptions`].
//!
//! # Writing and reading
//!
//! ```no_run
//! use rustyconduit::Node;
//! use rustyconduit_relay::{Hdf5File, SlabOptions};
//!
//! let mut n = Node::new();
//! n.fetch("fields/p").set_slice(&[1.0f64, 2.0, 3.0]);
//!
//! let mut f = Hdf5File::open("out.h5", "w").unwrap();
//! f.write(&n, "/").unwrap();
//! let tail = f.read_with_options("fields/p", &SlabOptions::new().offset(1)).unwrap();
//! assert_eq!(tail.to_f64_vec().unwrap(), vec![2.0, 3.0]);
//! f.close().unwrap();
//! ```
//!
//! # One-shot entry points
//!
//! ```no_run
//! use rustyconduit::Node;
//!
//! let mut n = Node::new();
//! n.fetch("a").set(7i32);
//! rustyconduit_relay::hdf5_save(&n, "out.h5:run/0").unwrap();
//! let back = rustyconduit_relay::hdf5_read("out.h5:run/0").unwrap();
//! assert_eq!(back, n);
//! ```

mod compat;
pub mod diagnostics;
pub mod error;
mod mapping;
pub mod options;
pub mod path;
mod read;
pub mod slab;
mod store;
mod write;

pub use diagnostics::{Diagnostics, SuppressDiagnostics};
pub use error::{Error, Result};
pub use mapping::{EMPTY_TAG, LIST_MARKER};
pub use options::{Chunking, CompactStorage, Compression, CompressionMethod, Hdf5Options, OpenMode, ZfpMode};
pub use path::split_file_path;
pub use slab::{SlabOptions, SlabParams};
pub use store::{DatasetHandle, GroupHandle, Hdf5File};

use rustyconduit::Node;

/// Write `node` to `"<file>:<path>"`, keeping whatever else the file holds.
pub fn hdf5_write(node: &Node, location: &str) -> Result<()> {
    let (file, path) = split_file_path(location);
    let mut f = Hdf5File::open(file, "a")?;
    f.write(node, &path)?;
    f.close()
}

/// Write `node` to `"<file>:<path>"` in a new (or truncated) file.
pub fn hdf5_save(node: &Node, location: &str) -> Result<()> {
    let (file, path) = split_file_path(location);
    let mut f = Hdf5File::create(file)?;
    f.write(node, &path)?;
    f.close()
}

pub fn hdf5_read(location: &str) -> Result<Node> {
    let (file, path) = split_file_path(location);
    Hdf5File::open(file, "r")?.read(&path)
}

pub fn hdf5_read_info(location: &str) -> Result<Node> {
    let (file, path) = split_file_path(location);
    Hdf5File::open(file, "r")?.read_info(&path)
}

/// Whether `"<file>:<path>"` names an object. A missing file is an error.
pub fn hdf5_has_path(location: &str) -> Result<bool> {
    let (file, path) = split_file_path(location);
    Ok(Hdf5File::open(file, "r")?.has_path(&path))
}

pub fn hdf5_remove(location: &str) -> Result<()> {
    let (file, path) = split_file_path(location);
    let mut f = Hdf5File::open(file, "a")?;
    f.remove(&path)?;
    f.close()
}
