//! The store handle.
//!
//! An [`Hdf5File`] holds a whole file as a [`FileImage`] while it is open
//! and writes it back on [`Hdf5File::flush`] or [`Hdf5File::close`].
//! Groups and datasets are addressed by slash paths relative to the root.

use std::path::{Path, PathBuf};

use rustyconduit_format::{CodecRegistry, FileImage, FormatError, Object, ObjectId};
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::options::{Hdf5Options, OpenMode};
use crate::path::{display, normalize};

/// A group found by [`Hdf5File::group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHandle {
    pub(crate) id: ObjectId,
    pub(crate) path: String,
}

impl GroupHandle {
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A dataset found by [`Hdf5File::dataset`]. Writes that recreate the
/// dataset hand back a new handle; the old one then reports
/// [`Error::StaleHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    pub(crate) id: ObjectId,
    pub(crate) path: String,
}

impl DatasetHandle {
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// An open HDF5 file.
pub struct Hdf5File {
    path: PathBuf,
    pub(crate) image: FileImage,
    pub(crate) codecs: CodecRegistry,
    mode: OpenMode,
    pub(crate) options: Hdf5Options,
    pub(crate) diagnostics: Diagnostics,
}

impl std::fmt::Debug for Hdf5File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hdf5File")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Hdf5File {
    /// Create (or truncate) `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenMode::TRUNCATE, CodecRegistry::new())
    }

    /// Open `path` with a mode string over `r`, `w`, `a`, `t`; see
    /// [`OpenMode`]. A writable, non-truncating open of a missing file
    /// creates it.
    pub fn open<P: AsRef<Path>>(path: P, mode: &str) -> Result<Self> {
        Self::open_with(path, OpenMode::parse(mode)?, CodecRegistry::new())
    }

    /// Open with a codec registry holding host-provided filters.
    pub fn open_with<P: AsRef<Path>>(path: P, mode: OpenMode, codecs: CodecRegistry) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = path.display().to_string();
        debug!(%file, ?mode, "opening store");
        let image = if mode.truncate || (mode.write && !path.exists()) {
            FileImage::new()
        } else {
            let bytes = std::fs::read(&path).map_err(|source| Error::Io {
                file: file.clone(),
                source,
            })?;
            FileImage::parse(&bytes, &codecs).map_err(|source| Error::Format { file, source })?
        };
        Ok(Self {
            path,
            image,
            codecs,
            mode,
            options: Hdf5Options::default(),
            diagnostics: Diagnostics::default(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path.display().to_string()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn options(&self) -> &Hdf5Options {
        &self.options
    }

    pub fn set_options(&mut self, options: Hdf5Options) {
        self.options = options;
    }

    /// Registry used to encode and decode chunks; register a ZFP codec here
    /// before writing with [`CompressionMethod::Zfp`](crate::CompressionMethod::Zfp).
    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Write the image back to disk. Read-only handles have nothing to
    /// write.
    pub fn flush(&mut self) -> Result<()> {
        if !self.mode.write {
            return Ok(());
        }
        let bytes = self.image.to_bytes(&self.codecs).map_err(|e| self.format_error(e))?;
        debug!(file = %self.path.display(), bytes = bytes.len(), "flushing store");
        std::fs::write(&self.path, bytes).map_err(|source| Error::Io {
            file: self.file_name(),
            source,
        })
    }

    /// Flush and release the file.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        debug!(file = %self.path.display(), "closed store");
        Ok(())
    }

    // ------------------------------------------------------------------
    // lookups
    // ------------------------------------------------------------------

    /// Object at `path`, or `None`. Records a diagnostic on a miss unless
    /// diagnostics are suppressed.
    pub(crate) fn probe(&self, path: &str) -> Option<ObjectId> {
        let found = self.image.resolve(self.image.root(), path);
        if found.is_none() {
            self.diagnostics
                .push(format!("{}:{}: lookup failed", self.file_name(), display(path)));
        }
        found
    }

    pub(crate) fn locate(&self, path: &str) -> Result<ObjectId> {
        let path = normalize(path);
        self.probe(&path).ok_or_else(|| self.not_found(&path))
    }

    pub fn has_path(&self, path: &str) -> bool {
        let _quiet = self.diagnostics.suppress();
        self.probe(&normalize(path)).is_some()
    }

    pub fn group(&self, path: &str) -> Result<GroupHandle> {
        let path = normalize(path);
        let id = self.locate(&path)?;
        match self.image.get(id) {
            Some(Object::Group(_)) => Ok(GroupHandle { id, path }),
            Some(other) => Err(self.wrong_kind(&path, "group", other.kind())),
            None => Err(self.not_found(&path)),
        }
    }

    pub fn dataset(&self, path: &str) -> Result<DatasetHandle> {
        let path = normalize(path);
        let id = self.locate(&path)?;
        match self.image.get(id) {
            Some(Object::Dataset(_)) => Ok(DatasetHandle { id, path }),
            Some(other) => Err(self.wrong_kind(&path, "dataset", other.kind())),
            None => Err(self.not_found(&path)),
        }
    }

    /// Link names of the group at `path`, in the order they are read.
    pub fn child_names(&self, path: &str) -> Result<Vec<String>> {
        let handle = self.group(path)?;
        Ok(self
            .image
            .group(handle.id)
            .map(|g| g.links().into_iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default())
    }

    /// Unlink the object at `path`; objects no longer reachable are freed.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        self.require_write()?;
        let path = normalize(path);
        let Some((parent, name)) = split_last(&path) else {
            return Err(Error::Usage(format!("{}: cannot remove the root group", self.file_name())));
        };
        let parent_id = self.group(parent)?.id;
        if self.image.unlink(parent_id, name).is_none() {
            return Err(self.not_found(&path));
        }
        debug!(file = %self.path.display(), path = %display(&path), "removed object");
        Ok(())
    }

    /// Add a hard link at `link_path` to the object at `target`. Links may
    /// point back at an ancestor.
    pub fn link(&mut self, target: &str, link_path: &str) -> Result<()> {
        self.require_write()?;
        let target_id = self.locate(target)?;
        let link_path = normalize(link_path);
        let Some((parent, name)) = split_last(&link_path) else {
            return Err(Error::Usage("the root cannot be a link".into()));
        };
        let parent_id = self.group(parent)?.id;
        let file = self.file_name();
        match self.image.group_mut(parent_id) {
            Some(group) => group
                .add_link(name, target_id)
                .map_err(|source| Error::Format { file, source }),
            None => Err(self.not_found(parent)),
        }
    }

    // ------------------------------------------------------------------
    // error helpers
    // ------------------------------------------------------------------

    pub(crate) fn require_write(&self) -> Result<()> {
        if self.mode.write {
            Ok(())
        } else {
            Err(Error::Usage(format!("{} is open read-only", self.file_name())))
        }
    }

    pub(crate) fn not_found(&self, path: &str) -> Error {
        Error::NotFound {
            file: self.file_name(),
            path: display(path),
        }
    }

    pub(crate) fn wrong_kind(&self, path: &str, expected: &'static str, found: &'static str) -> Error {
        Error::WrongKind {
            file: self.file_name(),
            path: display(path),
            expected,
            found,
        }
    }

    pub(crate) fn format_error(&self, source: FormatError) -> Error {
        Error::Format {
            file: self.file_name(),
            source,
        }
    }

    /// Live dataset behind `handle`.
    pub(crate) fn check_handle(&self, handle: &DatasetHandle) -> Result<()> {
        if self.image.dataset(handle.id).is_some() {
            Ok(())
        } else {
            Err(Error::StaleHandle(format!("{}:{}", self.file_name(), display(&handle.path))))
        }
    }
}

/// `("a/b", "c")` for `"a/b/c"`; `None` for the root.
pub(crate) fn split_last(path: &str) -> Option<(&str, &str)> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').unwrap_or(("", path)))
}
