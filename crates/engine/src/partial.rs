//! Partial updates and the load-then-update driver.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use tree::{Block, EntryBlocks, EntryFlags, EntryStat, EntryStatus, Tree};
use waa::{Area, WaaError, DIR_EXT};

use crate::context::UpdateContext;
use crate::error::EngineError;
use crate::updater::update_tree;

/// Seeds the selection bits from the argument paths, then runs
/// [`update_tree`].
///
/// Every path must either exist in the filesystem (it is created in the
/// tree if missing, flagged as added) or already be known to the tree; an
/// unknown, non-existing path is an error. The named entry is marked for
/// full processing, its ancestor chain for look-below; if no argument
/// reached the root at all the pass falls back to a full update.
pub fn partial_update(
    tree: &mut Tree,
    normalized: &[PathBuf],
    blocks: &mut EntryBlocks,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), EngineError> {
    for path in normalized {
        debug!("update {:?}", path);
        // The entry must exist on disk (then it may be created in the
        // list) or be in the list already.
        let exists = match fs::symlink_metadata(path) {
            Ok(_) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => return Err(EngineError::io("lstat", path, err)),
        };

        let known_before = tree.len();
        let id = tree.traverse(path, exists, EntryFlags::ADD)?;
        if tree.len() > known_before {
            // Freshly created entries join the stream so they get stat'ed
            // and dispatched like loaded ones.
            blocks.push_back(Block::new(
                known_before as u32,
                (tree.len() - known_before) as u32,
            ));
        }

        {
            let entry = tree.entry_mut(id);
            entry.do_full = true;
            entry.do_full_child = true;
        }
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let entry = tree.entry_mut(current);
            entry.do_a_child = true;
            entry.entry_status.insert(EntryStatus::CHILD_CHANGED);
            cursor = tree.entry(current).parent;
        }
    }

    update_tree(tree, blocks, ctx)
}

/// Loads the working copy's entry tree and brings it up to date.
///
/// The working directory must already be the working copy root (base
/// discovery moved there). A missing dir-file either propagates as
/// [`WaaError::NotFound`] (when `require_list` is set) or starts from an
/// empty root entry, in which case the update pass discovers the whole
/// tree. Finishes by running the action's end-of-run hook.
pub fn read_or_build_tree(
    normalized: &[PathBuf],
    wc_path: &Path,
    require_list: bool,
    ctx: &mut UpdateContext<'_>,
) -> Result<Tree, EngineError> {
    let stored = match ctx.session.read_byext(wc_path, Area::Waa, DIR_EXT) {
        Ok(bytes) => Some(bytes),
        Err(WaaError::NotFound) => None,
        Err(err) => return Err(err.into()),
    };

    let (mut tree, mut blocks) = match stored {
        Some(bytes) => {
            let (tree, blocks, info) = tree::read_tree(&bytes, None)?;
            ctx.session.approx_entry_count = u64::from(info.entry_count);
            debug!("read tree with {} entries", info.entry_count);
            (tree, blocks)
        }
        None if require_list => return Err(WaaError::NotFound.into()),
        None => {
            // First invocation: a root with zeroed stat data, so the
            // update pass sees it as changed and enumerates everything.
            let tree = Tree::with_root(".".into(), EntryStat::default());
            let mut blocks = EntryBlocks::new();
            blocks.push_back(Block::new(0, 1));
            (tree, blocks)
        }
    };

    partial_update(&mut tree, normalized, &mut blocks, ctx)?;
    ctx.action.local_uninit()?;
    Ok(tree)
}
