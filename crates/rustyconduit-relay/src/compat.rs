//! Can a node tree be written over what is already stored?
//!
//! The check never touches the store. Each conflict adds one line to the
//! explanation; an empty explanation means the write may go ahead.

use rustyconduit::{Node, TypeId};
use rustyconduit_format::{Datatype, Object, ObjectId};
use tracing::trace;

use crate::mapping::{describe, type_id_of, LIST_MARKER};
use crate::path::{display, join};
use crate::store::Hdf5File;

impl Hdf5File {
    /// Why `node` cannot be written at `path`, or `None` when it can.
    /// `slab` says whether the write addresses an offset or stride, which
    /// lifts the element-count check for fixed datasets.
    pub fn check_compatible(&self, node: &Node, path: &str, slab: bool) -> Option<String> {
        let path = crate::path::normalize(path);
        let mut problems = Vec::new();
        if path.is_empty() && node.is_leaf() {
            problems.push(format!(
                "{}:/: the file root is a group; a leaf cannot be written to it",
                self.file_name()
            ));
        } else {
            let _quiet = self.diagnostics.suppress();
            match self.existing_prefix(&path) {
                Err(blocker) => problems.push(format!(
                    "{}:{}: a dataset is in the way of {}",
                    self.file_name(),
                    display(&blocker),
                    display(&path)
                )),
                Ok(Some(id)) => self.check_object(node, id, slab, &path, &mut problems),
                Ok(None) => {}
            }
        }
        if problems.is_empty() {
            None
        } else {
            Some(problems.join("\n"))
        }
    }

    /// The object at `path` if it exists. A dataset on the way there is an
    /// error naming it.
    fn existing_prefix(&self, path: &str) -> Result<Option<ObjectId>, String> {
        let mut at = self.image.root();
        let mut walked = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let Some(group) = self.image.group(at) else {
                return Err(walked);
            };
            match group.link(part) {
                Some(link) => at = link.target,
                None => return Ok(None),
            }
            walked = join(&walked, part);
        }
        Ok(self.image.is_live(at).then_some(at))
    }

    fn check_object(&self, node: &Node, id: ObjectId, slab: bool, path: &str, out: &mut Vec<String>) {
        trace!(path = %display(path), "checking compatibility");
        let Some(object) = self.image.get(id) else {
            return;
        };
        let at = format!("{}:{}", self.file_name(), display(path));
        match object {
            Object::Dataset(ds) => {
                if node.is_object() || node.is_list() {
                    out.push(format!("{at}: cannot write a tree over a dataset"));
                    return;
                }
                let stored = type_id_of(&ds.datatype);
                let wanted = node.dtype().id();
                if stored != Some(wanted) {
                    out.push(format!(
                        "{at}: cannot write {} over a dataset of {}",
                        node.dtype().id(),
                        describe(&ds.datatype)
                    ));
                    return;
                }
                match &ds.datatype {
                    Datatype::VariableLength { .. } => {}
                    Datatype::String { size, .. } => {
                        let n = node.number_of_elements();
                        if u64::from(*size) != n {
                            out.push(format!("{at}: string of {n} bytes does not match char8_str[{size}]"));
                        }
                    }
                    _ if wanted == TypeId::Empty => {}
                    _ => {
                        let n = node.number_of_elements();
                        let stored_n = ds.dataspace.num_elements();
                        if !slab && !ds.is_extendible() && n != stored_n {
                            out.push(format!(
                                "{at}: {n} elements do not fit the fixed extent of {stored_n}"
                            ));
                        }
                    }
                }
            }
            Object::Group(group) => {
                if node.is_object() {
                    if group.attribute(LIST_MARKER).is_some() && !group.is_empty() {
                        out.push(format!("{at}: cannot write an object over a list group"));
                        return;
                    }
                    for (name, child) in node.entries() {
                        if let Some(link) = group.link(name) {
                            self.check_object(child, link.target, slab, &join(path, name), out);
                        }
                    }
                } else if node.is_list() {
                    if group.attribute(LIST_MARKER).is_none() && !group.is_empty() {
                        out.push(format!("{at}: cannot write a list over a group of named children"));
                        return;
                    }
                    let links = group.links();
                    for (i, child) in node.children().enumerate() {
                        if let Some(link) = links.get(i) {
                            self.check_object(child, link.target, slab, &join(path, &link.name), out);
                        }
                    }
                } else if node.is_leaf() {
                    out.push(format!("{at}: cannot write a {} leaf over a group", node.dtype().id()));
                } else {
                    out.push(format!("{at}: cannot write an empty node over a group"));
                }
            }
        }
    }
}
