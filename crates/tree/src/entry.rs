use std::ffi::OsString;
use std::fmt;
use std::fs::Metadata;
use std::ops::{BitOr, BitOrAssign};
use std::os::unix::fs::MetadataExt;

use crate::tree::EntryId;

const S_IFMT: u32 = 0o170_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFREG: u32 = 0o100_000;
const S_IFLNK: u32 = 0o120_000;
const S_IFCHR: u32 = 0o020_000;
const S_IFBLK: u32 = 0o060_000;

/// The stat fields the WAA persists for one entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryStat {
    /// Device the entry lives on.
    pub dev: u64,
    /// Inode number.
    pub ino: u64,
    /// Full mode word including the file type bits.
    pub mode: u32,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: i64,
    /// Hard link count.
    pub nlink: u64,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
}

impl EntryStat {
    /// Captures the persisted fields from an `lstat` result.
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
            mode: meta.mode(),
            size: meta.size(),
            mtime: meta.mtime(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
        }
    }

    /// Tests the file type bits for a directory.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Orders two stats by (device, inode), the streaming order of the
    /// dir-file.
    #[must_use]
    pub fn inode_cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.dev, self.ino).cmp(&(other.dev, other.ino))
    }

    /// The permission and ownership part of the stat, used for
    /// meta-data-change detection.
    #[must_use]
    pub const fn meta_triple(&self) -> (u32, u32, u32) {
        (self.mode & !S_IFMT, self.uid, self.gid)
    }
}

/// Kind of filesystem object an entry describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryType {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Block or character device.
    Device,
    /// Not versioned; sockets, fifos, and everything an ignore pattern hit.
    Ignored,
}

impl EntryType {
    /// Maps the stat type bits onto an entry type.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFDIR => Self::Directory,
            S_IFREG => Self::Regular,
            S_IFLNK => Self::Symlink,
            S_IFCHR | S_IFBLK => Self::Device,
            _ => Self::Ignored,
        }
    }
}

/// Transient per-entry change bits, computed by the updater.
///
/// A *replaced* entry (its filesystem type changed since the last persist)
/// carries [`EntryStatus::DELETED`] and [`EntryStatus::REPLACED`] together;
/// `DELETED` alone means the entry is simply gone.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStatus(u16);

impl EntryStatus {
    /// Entry did not exist in the previous persist.
    pub const NEW: Self = Self(1 << 0);
    /// Content differs (size changed, or confirmed by checksum).
    pub const CHANGED: Self = Self(1 << 1);
    /// Entry no longer exists in the filesystem.
    pub const DELETED: Self = Self(1 << 2);
    /// Entry was replaced by an object of a different type.
    pub const REPLACED: Self = Self(1 << 3);
    /// Only mode or ownership differ.
    pub const META_CHANGED: Self = Self(1 << 4);
    /// Possibly changed; mtime differs but the size does not.
    pub const LIKELY: Self = Self(1 << 5);
    /// Some child of this directory changed.
    pub const CHILD_CHANGED: Self = Self(1 << 6);

    /// No bits set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Tests whether no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Tests whether all bits of `other` are set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for EntryStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntryStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EntryStatus, &str); 7] = [
            (EntryStatus::NEW, "NEW"),
            (EntryStatus::CHANGED, "CHANGED"),
            (EntryStatus::DELETED, "DELETED"),
            (EntryStatus::REPLACED, "REPLACED"),
            (EntryStatus::META_CHANGED, "META_CHANGED"),
            (EntryStatus::LIKELY, "LIKELY"),
            (EntryStatus::CHILD_CHANGED, "CHILD_CHANGED"),
        ];
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Persistent per-entry flags; they survive the dir-file round trip.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFlags(u32);

impl EntryFlags {
    /// Entry was explicitly added.
    pub const ADD: Self = Self(1 << 0);
    /// Entry was explicitly taken out of version control.
    pub const UNVERSION: Self = Self(1 << 1);
    /// Entry is marked for a forced content check.
    pub const CHECK: Self = Self(1 << 2);

    /// No bits set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The raw bit representation stored in the dir-file.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Rebuilds flags from their stored representation.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Tests whether all bits of `other` are set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Tests whether any bit of `other` is set in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Sets the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryFlags({:#x})", self.0)
    }
}

/// One filesystem object in the entry tree.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Basename of the entry; the root is conventionally named `.`.
    pub name: OsString,
    /// Owning directory; `None` only for the tree root.
    pub parent: Option<EntryId>,
    /// Persisted stat data.
    pub stat: EntryStat,
    /// Kind of object.
    pub entry_type: EntryType,
    /// Change bits relative to the previous persist.
    pub entry_status: EntryStatus,
    /// Persistent flags.
    pub flags: EntryFlags,
    /// Children ordered by (device, inode); directories only.
    pub by_inode: Vec<EntryId>,
    /// Children ordered by name; rebuilt on demand from `by_inode`.
    pub by_name: Vec<EntryId>,
    /// Number of children in the persistent model.
    pub entry_count: u32,
    /// Transient cursor over the children, used by the loader and updater.
    pub child_index: u32,
    /// `by_inode` got new members and needs re-sorting before streaming.
    pub to_be_sorted: bool,
    /// Depth below the root; `path_level(root) == 0`.
    pub path_level: u32,
    /// 1-based position in the dir-file; valid only during load/save.
    pub file_index: u32,
    /// Cached length of the path built by [`crate::Tree::build_path`].
    pub path_len: u32,
    /// Repository revision; opaque to this layer.
    pub repos_rev: u64,
    /// Some descendant has a revision different from this entry's.
    pub other_revs: bool,
    /// Repository URL id; opaque to this layer.
    pub url: Option<u32>,
    /// This entry itself and its whole subtree are to be processed.
    pub do_full: bool,
    /// This entry itself is to be handled (stat'ed, dispatched).
    pub do_full_child: bool,
    /// Some descendant of this entry is to be processed.
    pub do_a_child: bool,
}

impl Entry {
    /// Creates an entry with the given identity and otherwise empty state.
    #[must_use]
    pub fn new(name: OsString, stat: EntryStat, entry_type: EntryType) -> Self {
        Self {
            name,
            parent: None,
            stat,
            entry_type,
            entry_status: EntryStatus::empty(),
            flags: EntryFlags::empty(),
            by_inode: Vec::new(),
            by_name: Vec::new(),
            entry_count: 0,
            child_index: 0,
            to_be_sorted: false,
            path_level: 0,
            file_index: 0,
            path_len: 0,
            repos_rev: 0,
            other_revs: false,
            url: None,
            do_full: false,
            do_full_child: false,
            do_a_child: false,
        }
    }

    /// Tests whether this entry currently is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}
