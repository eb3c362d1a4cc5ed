//! Atomic file store inside the administrative area.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::WaaError;
use crate::paths::Area;
use crate::session::Session;

/// Extension of the serialized entry tree.
pub const DIR_EXT: &str = "dir";

const TMP_EXT: &str = ".tmp";

/// A resolved storage directory for one working-copy path.
#[derive(Clone, Debug)]
pub struct StorageDir {
    root: PathBuf,
    bucket: PathBuf,
    stem: String,
}

impl StorageDir {
    pub(crate) fn new(root: PathBuf, bucket: PathBuf, stem: String) -> Self {
        Self { root, bucket, stem }
    }

    /// The fan-out directory all artifacts of this working copy live in.
    #[must_use]
    pub fn bucket(&self) -> &Path {
        &self.bucket
    }

    /// Full path of the artifact named by `extension`.
    #[must_use]
    pub fn file(&self, extension: &str) -> PathBuf {
        self.bucket.join(extension)
    }

    /// Temporary name for a write to the artifact named by `extension`.
    ///
    /// The fan-out part of the name is flattened (separators become `_`)
    /// and `.tmp` appended, so the temporary lives directly under the area
    /// root: it needs no directory chain up front, and writers to
    /// different artifacts never collide.
    #[must_use]
    pub fn tmp_file(&self, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}{}", self.stem, extension, TMP_EXT))
    }
}

/// A write handle for one artifact in the area.
///
/// The handle writes to its temporary name. [`WaaWriter::commit`] makes the
/// contents visible under the destination name via rename; dropping the
/// handle without committing (or calling [`WaaWriter::abort`]) unlinks the
/// temporary, so no partial file is ever observable at the destination.
#[derive(Debug)]
pub struct WaaWriter {
    file: File,
    tmp: PathBuf,
    dest: PathBuf,
    done: bool,
}

impl WaaWriter {
    /// Finishes the write: creates missing parent directories, then renames
    /// the temporary onto the destination.
    pub fn commit(mut self) -> Result<(), WaaError> {
        self.file
            .flush()
            .map_err(|err| WaaError::io("write", &self.tmp, err))?;
        if let Some(parent) = self.dest.parent() {
            fs::create_dir_all(parent).map_err(|err| WaaError::io("mkdir", parent, err))?;
        }
        fs::rename(&self.tmp, &self.dest)
            .map_err(|err| WaaError::io("rename temporary file to", &self.dest, err))?;
        debug!("committed {:?}", self.dest);
        self.done = true;
        Ok(())
    }

    /// Abandons the write and removes the temporary file.
    pub fn abort(mut self) -> Result<(), WaaError> {
        self.done = true;
        fs::remove_file(&self.tmp).map_err(|err| WaaError::io("unlink", &self.tmp, err))
    }

    /// The destination this writer will commit to.
    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

impl Drop for WaaWriter {
    fn drop(&mut self) {
        if !self.done {
            if let Err(err) = fs::remove_file(&self.tmp) {
                tracing::warn!("cannot remove temporary file {:?}: {err}", self.tmp);
            }
        }
    }
}

impl Write for WaaWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for WaaWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Session {
    /// Tests whether a working copy is registered for `path`.
    ///
    /// This is the extension-less probe: it checks the fan-out directory
    /// itself and reports a missing one as the silent
    /// [`WaaError::NotFound`].
    pub fn probe(&self, path: &Path) -> Result<(), WaaError> {
        let storage = self.storage_dir(path, Area::Waa, false)?;
        match fs::symlink_metadata(storage.bucket()) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(WaaError::NotFound),
            Err(err) => Err(WaaError::io("lstat", storage.bucket(), err)),
        }
    }

    /// Opens an artifact for reading.
    pub fn open_byext(&self, path: &Path, area: Area, extension: &str) -> Result<File, WaaError> {
        let storage = self.storage_dir(path, area, false)?;
        let file = storage.file(extension);
        match File::open(&file) {
            Ok(handle) => {
                debug!("reading target {:?}", file);
                Ok(handle)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(WaaError::NotFound),
            Err(err) => Err(WaaError::io("open", &file, err)),
        }
    }

    /// Reads a whole artifact into memory.
    pub fn read_byext(
        &self,
        path: &Path,
        area: Area,
        extension: &str,
    ) -> Result<Vec<u8>, WaaError> {
        let mut file = self.open_byext(path, area, extension)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|err| WaaError::io("read", path, err))?;
        Ok(contents)
    }

    /// Opens an artifact for writing through a temporary file.
    pub fn open_write(
        &self,
        path: &Path,
        area: Area,
        extension: &str,
    ) -> Result<WaaWriter, WaaError> {
        let storage = self.storage_dir(path, area, false)?;
        let tmp = storage.tmp_file(extension);
        let dest = storage.file(extension);
        let file = File::create(&tmp).map_err(|err| WaaError::io("create", &tmp, err))?;
        debug!("tmp for target {:?} is {:?}", dest, tmp);
        Ok(WaaWriter {
            file,
            tmp,
            dest,
            done: false,
        })
    }

    /// Removes an artifact, then opportunistically removes the two fan-out
    /// levels above it when they became empty.
    pub fn delete_byext(
        &self,
        path: &Path,
        area: Area,
        extension: &str,
        ignore_missing: bool,
    ) -> Result<(), WaaError> {
        let storage = self.storage_dir(path, area, false)?;
        let file = storage.file(extension);
        if let Err(err) = fs::remove_file(&file) {
            if !(ignore_missing && err.kind() == io::ErrorKind::NotFound) {
                return Err(WaaError::io("unlink", &file, err));
            }
        }
        // Clean-up only; failures (non-empty directories) are expected.
        if fs::remove_dir(storage.bucket()).is_ok() {
            if let Some(parent) = storage.bucket().parent() {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }

    /// Creates an informational symlink in the CONF fan-out directory.
    ///
    /// Used to mark the base of a working copy, e.g.
    /// `$FSVC_CONF/<fan-out>/_base -> /etc`. Idempotent: an existing link
    /// is left alone.
    pub fn make_info_link(
        &self,
        directory: &Path,
        name: &str,
        target: &Path,
    ) -> Result<(), WaaError> {
        let storage = self.storage_dir(directory, Area::Conf, true)?;
        let link = storage.file(name);
        if fs::symlink_metadata(&link).is_ok() {
            return Ok(());
        }
        std::os::unix::fs::symlink(target, &link)
            .map_err(|err| WaaError::io("create informational symlink", &link, err))
    }
}
