//! Directory enumeration, wrapping the filesystem behind a WAA-aware
//! adapter.

use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::MetadataExt;

use tracing::debug;

use tree::EntryStat;

use crate::error::EngineError;

/// One live child of the enumerated directory.
#[derive(Clone, Debug)]
pub struct LiveEntry {
    /// Basename.
    pub name: OsString,
    /// lstat result.
    pub stat: EntryStat,
}

/// Requested ordering of an enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumOrder {
    /// Sorted by (device, inode); the streaming order.
    ByInode,
    /// Sorted by name; the merge order.
    ByName,
}

/// Enumerates the current working directory.
///
/// If the directory *is* the WAA root (same device and inode as
/// `waa_stat`), an empty listing is returned so the administrative area
/// never shows up as a versioned subtree.
pub fn dir_enum(
    waa_stat: Option<(u64, u64)>,
    order: EnumOrder,
) -> Result<Vec<LiveEntry>, EngineError> {
    let here = fs::symlink_metadata(".").map_err(|err| EngineError::io("lstat", ".", err))?;
    if waa_stat == Some((here.dev(), here.ino())) {
        debug!("not enumerating the WAA root itself");
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let listing = fs::read_dir(".").map_err(|err| EngineError::io("open directory", ".", err))?;
    for dirent in listing {
        let dirent = dirent.map_err(|err| EngineError::io("read directory", ".", err))?;
        let meta = dirent
            .metadata()
            .map_err(|err| EngineError::io("lstat", dirent.path(), err))?;
        entries.push(LiveEntry {
            name: dirent.file_name(),
            stat: EntryStat::from_metadata(&meta),
        });
    }

    match order {
        EnumOrder::ByInode => entries.sort_by(|a, b| a.stat.inode_cmp(&b.stat)),
        EnumOrder::ByName => entries.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    Ok(entries)
}
