use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::entry::{Entry, EntryFlags, EntryStat, EntryStatus, EntryType};
use crate::error::TreeError;

/// Index of an entry in its [`Tree`] arena.
///
/// Ids are stable for the lifetime of the tree; entries are never moved or
/// reused, only detached from their parent's child views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    /// Arena index of this id.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Arena owning the whole entry tree of one working copy.
#[derive(Debug)]
pub struct Tree {
    entries: Vec<Entry>,
}

impl Tree {
    /// Id of the root entry; the root is created with the tree and never
    /// destroyed.
    pub const ROOT: EntryId = EntryId(0);

    /// Creates a tree containing only the root directory.
    #[must_use]
    pub fn with_root(name: OsString, stat: EntryStat) -> Self {
        let root = Entry::new(name, stat, EntryType::Directory);
        Self {
            entries: vec![root],
        }
    }

    /// Number of entries ever allocated, including detached ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the root exists from construction on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared access to an entry.
    #[must_use]
    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id.index()]
    }

    /// Mutable access to an entry.
    pub fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id.index()]
    }

    /// Moves a fully prepared entry into the arena.
    pub fn push(&mut self, entry: Entry) -> EntryId {
        let id = EntryId::from_index(self.entries.len());
        self.entries.push(entry);
        id
    }

    /// Creates a child entry below `parent` without linking it into the
    /// parent's child views.
    ///
    /// The entry type is derived from the stat's mode. Use [`Tree::attach`]
    /// once the entry is known to be wanted; ignored entries stay detached.
    pub fn new_detached(&mut self, parent: EntryId, name: &OsStr, stat: EntryStat) -> EntryId {
        let mut entry = Entry::new(name.to_os_string(), stat, EntryType::from_mode(stat.mode));
        entry.parent = Some(parent);
        entry.path_level = self.entry(parent).path_level + 1;
        self.push(entry)
    }

    /// Links `child` into `parent`'s child views.
    pub fn attach(&mut self, parent: EntryId, child: EntryId) {
        let entry = &mut self.entries[parent.index()];
        entry.by_inode.push(child);
        entry.by_name.clear();
        entry.entry_count = entry.by_inode.len() as u32;
        entry.to_be_sorted = true;
    }

    /// Sorts `dir`'s `by_inode` view by (device, inode).
    ///
    /// The sort is stable, so hard links (equal keys) keep their insertion
    /// order and stay adjacent.
    pub fn sort_by_inode(&mut self, dir: EntryId) {
        let mut view = std::mem::take(&mut self.entries[dir.index()].by_inode);
        view.sort_by(|a, b| self.entry(*a).stat.inode_cmp(&self.entry(*b).stat));
        let entry = &mut self.entries[dir.index()];
        entry.by_inode = view;
        entry.to_be_sorted = false;
    }

    /// Rebuilds `dir`'s `by_name` view from `by_inode`, sorted by name.
    pub fn sort_by_name(&mut self, dir: EntryId) {
        let mut view = self.entries[dir.index()].by_inode.clone();
        view.sort_by(|a, b| self.entry(*a).name.cmp(&self.entry(*b).name));
        self.entries[dir.index()].by_name = view;
    }

    /// Finds a direct child of `dir` by name.
    #[must_use]
    pub fn find_child(&self, dir: EntryId, name: &OsStr) -> Option<EntryId> {
        self.entry(dir)
            .by_inode
            .iter()
            .copied()
            .find(|&child| self.entry(child).name == name)
    }

    /// Appends freshly discovered children to `dir`'s views.
    ///
    /// The `by_inode` view is only marked for re-sorting; the serializer
    /// sorts lazily before streaming.
    pub fn new_entries(&mut self, dir: EntryId, new_children: &[EntryId]) {
        if new_children.is_empty() {
            return;
        }
        let entry = &mut self.entries[dir.index()];
        entry.by_inode.extend_from_slice(new_children);
        entry.by_name.clear();
        entry.entry_count = entry.by_inode.len() as u32;
        entry.to_be_sorted = true;
    }

    /// Detaches all children of `dir` that were marked ignored.
    pub fn free_marked(&mut self, dir: EntryId) {
        let mut view = std::mem::take(&mut self.entries[dir.index()].by_inode);
        view.retain(|&child| self.entry(child).entry_type != EntryType::Ignored);
        let entry = &mut self.entries[dir.index()];
        entry.by_inode = view;
        entry.by_name.clear();
        entry.entry_count = entry.by_inode.len() as u32;
    }

    /// Detaches every entry that is gone from the filesystem from its
    /// parent's child views.
    ///
    /// Called before persisting: deleted entries are destroyed (their arena
    /// slots remain as tombstones, but nothing references them any more).
    /// Replaced entries carry [`EntryStatus::DELETED`] together with
    /// [`EntryStatus::REPLACED`] and stay attached: the filesystem object
    /// still exists under that name, only its stored children were dropped
    /// by the update pass.
    pub fn prune_deleted(&mut self) {
        for index in 0..self.entries.len() {
            if self.entries[index].by_inode.is_empty() {
                continue;
            }
            let mut view = std::mem::take(&mut self.entries[index].by_inode);
            view.retain(|&child| {
                let status = self.entry(child).entry_status;
                !status.contains(EntryStatus::DELETED) || status.contains(EntryStatus::REPLACED)
            });
            let entry = &mut self.entries[index];
            entry.by_inode = view;
            entry.by_name.clear();
            entry.entry_count = entry.by_inode.len() as u32;
        }
    }

    /// Builds the path of `id` from the root downwards.
    ///
    /// The root is named `.`, so results look like `./sub/file` and are
    /// valid relative to the working copy root.
    #[must_use]
    pub fn build_path(&self, id: EntryId) -> PathBuf {
        let mut chain = Vec::with_capacity(self.entry(id).path_level as usize + 1);
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.entry(current).parent;
        }
        let mut path = PathBuf::new();
        for current in chain.iter().rev() {
            path.push(&self.entry(*current).name);
        }
        path
    }

    /// Returns the cached path length of `id`, computing missing values on
    /// the ancestor chain.
    pub fn calc_path_len(&mut self, id: EntryId) -> u32 {
        if self.entry(id).path_len != 0 {
            return self.entry(id).path_len;
        }
        // Find the nearest ancestor with a cached value, then fill downwards.
        let mut chain = vec![id];
        let mut cursor = self.entry(id).parent;
        while let Some(current) = cursor {
            if self.entry(current).path_len != 0 {
                break;
            }
            chain.push(current);
            cursor = self.entry(current).parent;
        }
        for &current in chain.iter().rev() {
            let own = self.entry(current).name.len() as u32;
            let len = match self.entry(current).parent {
                Some(parent) => self.entry(parent).path_len + 1 + own,
                None => own,
            };
            self.entry_mut(current).path_len = len;
        }
        self.entry(id).path_len
    }

    /// Derives the selection bits of `id` from its parent.
    ///
    /// A child of a fully processed directory is itself fully processed;
    /// bits that were set beforehand (partial-update targets) are kept.
    pub fn set_to_handle_bits(&mut self, id: EntryId) {
        let Some(parent) = self.entry(id).parent else {
            return;
        };
        if self.entry(parent).do_full {
            let entry = self.entry_mut(id);
            entry.do_full = true;
            entry.do_full_child = true;
        }
    }

    /// Re-stats the live filesystem object behind `id` and merges the
    /// difference into `entry_status`.
    ///
    /// A missing object sets `DELETED`; a type change sets
    /// `DELETED | REPLACED` and adopts the new identity; otherwise size,
    /// mtime, and ownership differences map to `CHANGED`, `LIKELY`, and
    /// `META_CHANGED`.
    pub fn update_single_entry(&mut self, id: EntryId, path: &Path) -> Result<(), TreeError> {
        match fs::symlink_metadata(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.entry_mut(id).entry_status.insert(EntryStatus::DELETED);
            }
            Err(err) => return Err(TreeError::io("lstat", path, err)),
            Ok(meta) => {
                let new = EntryStat::from_metadata(&meta);
                let new_type = EntryType::from_mode(new.mode);
                let entry = self.entry_mut(id);
                if new_type == entry.entry_type {
                    if new.size != entry.stat.size {
                        entry.entry_status.insert(EntryStatus::CHANGED);
                    } else if new.mtime != entry.stat.mtime {
                        entry.entry_status.insert(EntryStatus::LIKELY);
                    }
                    if new.meta_triple() != entry.stat.meta_triple() {
                        entry.entry_status.insert(EntryStatus::META_CHANGED);
                    }
                    entry.stat = new;
                } else {
                    entry
                        .entry_status
                        .insert(EntryStatus::DELETED | EntryStatus::REPLACED);
                    entry.stat = new;
                    entry.entry_type = new_type;
                }
            }
        }
        Ok(())
    }

    /// Walks `path` from the root, component by component.
    ///
    /// With `create`, components missing from the tree are lstat'ed and
    /// inserted with `flag` and status `NEW`; the path is interpreted
    /// relative to the current working directory, which must be the working
    /// copy root. Without `create`, an unknown component is an error.
    pub fn traverse(
        &mut self,
        path: &Path,
        create: bool,
        flag: EntryFlags,
    ) -> Result<EntryId, TreeError> {
        let mut current = Self::ROOT;
        let mut walked = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(name) => {
                    walked.push(name);
                    if let Some(child) = self.find_child(current, name) {
                        current = child;
                        continue;
                    }
                    if !create {
                        return Err(TreeError::UnknownEntry(path.to_path_buf()));
                    }
                    let meta = fs::symlink_metadata(&walked).map_err(|err| {
                        if err.kind() == io::ErrorKind::NotFound {
                            TreeError::UnknownEntry(path.to_path_buf())
                        } else {
                            TreeError::io("lstat", &walked, err)
                        }
                    })?;
                    let id =
                        self.new_detached(current, name, EntryStat::from_metadata(&meta));
                    let entry = self.entry_mut(id);
                    entry.flags.insert(flag);
                    entry.entry_status.insert(EntryStatus::NEW);
                    self.attach(current, id);
                    current = id;
                }
                _ => return Err(TreeError::InvalidPath(path.to_path_buf())),
            }
        }
        Ok(current)
    }
}
