//! Dir-file serialization.
//!
//! The dir-file is the persistent form of one working copy's entry tree:
//! a fixed-width header line followed by one record per entry. Two ordering
//! rules shape the body:
//!
//! - a parent record always precedes its children, so one forward pass can
//!   rebuild every link from `parent_idx` positions, and
//! - entries are emitted approximately sorted by inode, so the next
//!   invocation's stat pass touches the disk mostly in layout order.
//!
//! The second rule is approximate by design: going strictly by inode would
//! need multiple passes whenever a parent has a higher inode than a child.
//! Instead the writer keeps one cursor per open directory in an array that
//! stays sorted by the inode each cursor currently points at; only the
//! cursor whose head just advanced is repositioned (a one-element
//! insertion, not a full sort), which also keeps hard links adjacent.

use std::cmp::Ordering;
use std::io::{self, Seek, SeekFrom, Write};

use crate::blocks::{Block, EntryBlocks};
use crate::entry::{EntryFlags, EntryType};
use crate::error::TreeError;
use crate::record;
use crate::tree::{EntryId, Tree};

/// Size of the header line, including the trailing `$\n`.
pub const HEADER_LEN: usize = 64;

/// Format version stored in and checked against the header.
pub const WAA_VERSION: u32 = 1;

/// Header counters of a dir-file, as written or as read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirFileInfo {
    /// Number of records, root included.
    pub entry_count: u32,
    /// High-water mark of the writer's cursor array; informational only,
    /// the loader parses but does not validate it.
    pub subdir_count: u32,
    /// Bytes of name storage the records need, plus slack.
    pub string_space: u32,
    /// Length of the longest entry path, plus slack.
    pub max_path_len: u32,
}

/// Per-entry hook invoked by [`read_tree`] for every loaded record.
///
/// The entry's path is deliberately not built for the call; compute it via
/// [`Tree::build_path`] if needed.
pub type LoadCallback<'a> =
    dyn FnMut(&Tree, EntryId) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + 'a;

/// A cursor into one open directory's `by_inode` view.
#[derive(Clone, Copy)]
struct Cursor {
    dir: EntryId,
    pos: usize,
}

fn head_of(tree: &Tree, cursor: Cursor) -> EntryId {
    tree.entry(cursor.dir).by_inode[cursor.pos]
}

/// Returns the index at which a cursor with head `new_head` belongs in
/// `cursors` to keep the array sorted by current head inode.
///
/// Ties (hard links) place the newcomer *at* the matched index, directly
/// before the equal element. Fast paths cover the common cases of
/// neighbouring directory inodes before falling back to binary search.
fn find_position(tree: &Tree, new_head: EntryId, cursors: &[Cursor]) -> usize {
    let count = cursors.len();
    if count == 0 {
        return 0;
    }
    let new_stat = tree.entry(new_head).stat;
    let cmp_at = |index: usize| new_stat.inode_cmp(&tree.entry(head_of(tree, cursors[index])).stat);

    if cmp_at(0) == Ordering::Less {
        return 0;
    }
    if count == 1 {
        return 1;
    }
    if cmp_at(count - 1) != Ordering::Less {
        return count;
    }

    let mut smaller = 1;
    let mut bigger_eq = count - 1;
    loop {
        let middle = (smaller + bigger_eq) / 2;
        match cmp_at(middle) {
            Ordering::Greater => smaller = middle + 1,
            Ordering::Less => bigger_eq = middle,
            Ordering::Equal => {
                bigger_eq = middle;
                break;
            }
        }
        if bigger_eq <= smaller {
            break;
        }
    }
    bigger_eq
}

fn write_err(err: io::Error) -> TreeError {
    TreeError::Write(err)
}

/// Writes the whole tree as a dir-file body plus header.
///
/// Entries marked [`EntryType::Ignored`] are skipped. On return every
/// written entry carries its 1-based `file_index` and the header has been
/// rewritten in place with the final counters.
pub fn write_tree<W: Write + Seek>(tree: &mut Tree, out: &mut W) -> Result<DirFileInfo, TreeError> {
    let mut header = [b'\n'; HEADER_LEN];
    header[..10].copy_from_slice(b"UNFINISHED");
    out.write_all(&header).map_err(write_err)?;

    // The root sits above all URLs.
    tree.entry_mut(Tree::ROOT).url = None;
    let root_children = tree.entry(Tree::ROOT).by_inode.len() as u32;
    record::save_entry(out, tree.entry(Tree::ROOT), 0, root_children).map_err(write_err)?;
    tree.entry_mut(Tree::ROOT).file_index = 1;
    let mut complete_count: u32 = 1;

    let root_name_len = tree.entry(Tree::ROOT).name.len() as u32;
    tree.entry_mut(Tree::ROOT).path_len = root_name_len;
    let mut string_space = root_name_len;
    let mut max_path_len = root_name_len;

    let mut cursors: Vec<Cursor> = Vec::new();
    let mut max_cursors = 0_usize;
    if root_children > 0 {
        if tree.entry(Tree::ROOT).to_be_sorted {
            tree.sort_by_inode(Tree::ROOT);
        }
        cursors.push(Cursor {
            dir: Tree::ROOT,
            pos: 0,
        });
        max_cursors = 1;
    }

    while !cursors.is_empty() {
        // The first cursor points at the smallest current inode.
        let parent = cursors[0].dir;
        let current = head_of(tree, cursors[0]);

        cursors[0].pos += 1;
        if cursors[0].pos >= tree.entry(parent).by_inode.len() {
            cursors.remove(0);
        } else if cursors.len() > 1 {
            let advanced = head_of(tree, cursors[0]);
            let at = find_position(tree, advanced, &cursors[1..]);
            if at > 0 {
                let moved = cursors.remove(0);
                cursors.insert(at, moved);
            }
        }

        if tree.entry(current).entry_type == EntryType::Ignored {
            continue;
        }

        let parent_file_index = tree.entry(parent).file_index;
        let child_count = tree.entry(current).by_inode.len() as u32;
        record::save_entry(out, tree.entry(current), parent_file_index, child_count)
            .map_err(write_err)?;
        complete_count += 1;
        tree.entry_mut(current).file_index = complete_count;

        string_space += tree.entry(current).name.len() as u32 + 1;
        let path_len = tree.calc_path_len(current);
        if path_len > max_path_len {
            max_path_len = path_len;
        }

        if tree.entry(current).is_dir() && !tree.entry(current).by_inode.is_empty() {
            if tree.entry(current).to_be_sorted {
                tree.sort_by_inode(current);
            }
            let head = tree.entry(current).by_inode[0];
            let at = find_position(tree, head, &cursors);
            cursors.insert(
                at,
                Cursor {
                    dir: current,
                    pos: 0,
                },
            );
            if cursors.len() > max_cursors {
                max_cursors = cursors.len();
            }
        }
    }

    let info = DirFileInfo {
        entry_count: complete_count,
        subdir_count: max_cursors as u32,
        string_space: string_space + 4,
        max_path_len: max_path_len + 4,
    };

    let fields = format!(
        "{} {} {} {} {} {}",
        WAA_VERSION, HEADER_LEN, info.entry_count, info.subdir_count, info.string_space,
        info.max_path_len,
    );
    if fields.len() > HEADER_LEN - 2 {
        return Err(TreeError::HeaderSpace);
    }
    let mut header = [b' '; HEADER_LEN];
    header[..fields.len()].copy_from_slice(fields.as_bytes());
    header[HEADER_LEN - 2] = b'$';
    header[HEADER_LEN - 1] = b'\n';
    out.seek(SeekFrom::Start(0)).map_err(write_err)?;
    out.write_all(&header).map_err(write_err)?;

    Ok(info)
}

fn damaged(detail: &'static str) -> TreeError {
    TreeError::Damaged { detail }
}

/// Reconstructs a tree from dir-file contents.
///
/// All framing invariants are validated before and while parsing; any
/// violation surfaces as [`TreeError::Damaged`]. The optional `callback`
/// runs for every entry, the root included. Besides the tree this returns
/// the entry blocks for the updater's streaming pass and the header
/// counters.
pub fn read_tree(
    buf: &[u8],
    mut callback: Option<&mut LoadCallback>,
) -> Result<(Tree, EntryBlocks, DirFileInfo), TreeError> {
    if buf.len() < HEADER_LEN + 5
        || buf[HEADER_LEN - 1] != b'\n'
        || buf[HEADER_LEN - 2] != b'$'
    {
        return Err(damaged("the header is not correctly terminated"));
    }
    if buf[buf.len() - 2] != 0 || buf[buf.len() - 1] != b'\n' {
        return Err(damaged("the file is not correctly terminated"));
    }

    let header_text = std::str::from_utf8(&buf[..HEADER_LEN - 2])
        .map_err(|_| damaged("not all needed header fields could be parsed"))?;
    let fields: Vec<u64> = header_text
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| damaged("not all needed header fields could be parsed"))?;
    if fields.len() != 6 {
        return Err(damaged("not all needed header fields could be parsed"));
    }
    if fields[0] != u64::from(WAA_VERSION) || fields[1] != HEADER_LEN as u64 {
        return Err(damaged("the header has a wrong version"));
    }
    let info = DirFileInfo {
        entry_count: fields[2] as u32,
        subdir_count: fields[3] as u32,
        string_space: fields[4] as u32,
        max_path_len: fields[5] as u32,
    };
    let count = info.entry_count as usize;
    if count == 0 {
        return Err(damaged("the file contains no root entry"));
    }

    let mut pos = HEADER_LEN;
    let mut used_string_space: u64 = 0;

    let first = record::load_entry(buf, &mut pos)?;
    if first.parent_idx != 0 {
        return Err(damaged("the parent pointers are invalid"));
    }
    used_string_space += first.name.len() as u64 + 1;
    let mut tree = Tree::with_root(first.name, first.stat);
    {
        let root = tree.entry_mut(Tree::ROOT);
        root.entry_count = first.entry_count;
        root.flags = EntryFlags::from_bits(first.flags);
        root.repos_rev = first.repos_rev;
        root.file_index = 1;
        root.by_inode = Vec::with_capacity(first.entry_count as usize);
    }
    if let Some(cb) = callback.as_mut() {
        cb(&tree, Tree::ROOT).map_err(TreeError::Callback)?;
    }

    for index in 1..count {
        if pos >= buf.len() {
            return Err(damaged("an entry line has a wrong number of entries"));
        }
        let raw = record::load_entry(buf, &mut pos)?;
        used_string_space += raw.name.len() as u64 + 1;
        if used_string_space > u64::from(info.string_space) {
            return Err(damaged("the name space overflows"));
        }
        if raw.parent_idx == 0 || raw.parent_idx as usize > index {
            return Err(damaged("the parent pointers are invalid"));
        }
        let parent = EntryId::from_index(raw.parent_idx as usize - 1);
        if !tree.entry(parent).is_dir() {
            return Err(damaged("the parent pointers are invalid"));
        }

        let entry_type = EntryType::from_mode(raw.stat.mode);
        let id = tree.new_detached(parent, &raw.name, raw.stat);
        {
            let entry = tree.entry_mut(id);
            entry.entry_type = entry_type;
            entry.flags = EntryFlags::from_bits(raw.flags);
            entry.repos_rev = raw.repos_rev;
            entry.file_index = index as u32 + 1;
            // Non-directories are defined to have no children, whatever a
            // damaged record claims.
            if entry_type == EntryType::Directory {
                entry.entry_count = raw.entry_count;
                entry.by_inode = Vec::with_capacity(raw.entry_count as usize);
            }
        }

        let parent_entry = tree.entry_mut(parent);
        parent_entry.by_inode.push(id);
        parent_entry.child_index += 1;
        if parent_entry.child_index > parent_entry.entry_count {
            return Err(damaged("a directory has too many children"));
        }

        if raw.repos_rev != tree.entry(parent).repos_rev {
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if tree.entry(current).other_revs {
                    break;
                }
                tree.entry_mut(current).other_revs = true;
                cursor = tree.entry(current).parent;
            }
        }

        if let Some(cb) = callback.as_mut() {
            cb(&tree, id).map_err(TreeError::Callback)?;
        }
    }

    let mut blocks = EntryBlocks::new();
    blocks.push_back(Block::new(0, 1));
    blocks.insert_after_head(Block::new(1, count as u32 - 1));

    Ok((tree, blocks, info))
}
