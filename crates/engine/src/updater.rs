//! The streaming update pass over loaded entries.

use tracing::debug;

use tree::{EntryBlocks, EntryFlags, EntryStatus, EntryId, Tree};

use crate::context::UpdateContext;
use crate::error::EngineError;
use crate::merge::update_dir;

/// Runs the update pass over the entry stream.
///
/// Entries arrive in dir-file order, parents before children. Each selected
/// entry is re-stat'ed; a directory is finalized (checked for additions and
/// dispatched) exactly once, as soon as its child counter reaches the
/// persisted entry count. Without any selection seeded beforehand the whole
/// tree is updated.
pub fn update_tree(
    tree: &mut Tree,
    blocks: &mut EntryBlocks,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), EngineError> {
    let root = tree.entry(Tree::ROOT);
    if !(root.do_full || root.do_a_child) {
        // No partial selection was seeded; update everything.
        debug!("full tree update");
        let root = tree.entry_mut(Tree::ROOT);
        root.do_full = true;
        root.do_full_child = true;
    }

    while let Some(id) = blocks.pop_front_id() {
        handle_stream_entry(tree, id, ctx)?;
    }
    Ok(())
}

fn handle_stream_entry(
    tree: &mut Tree,
    id: EntryId,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), EngineError> {
    debug!("doing update for {:?}", tree.entry(id).name);
    if tree.entry(id).is_dir() {
        tree.entry_mut(id).child_index = 0;
    }

    let parent = tree.entry(id).parent;
    let mut parent_is_gone = false;

    'examine: {
        if let Some(parent) = parent {
            tree.set_to_handle_bits(id);
            // A deleted (or replaced) parent was a directory and is none
            // any more, so this child cannot exist either.
            if tree
                .entry(parent)
                .entry_status
                .contains(EntryStatus::DELETED)
            {
                tree.entry_mut(id).entry_status = EntryStatus::DELETED;
                parent_is_gone = true;
                break 'examine;
            }
        }

        let entry = tree.entry(id);
        if !(entry.do_full_child || entry.do_a_child) {
            break 'examine;
        }

        if tree.entry(id).do_full_child {
            let path = tree.build_path(id);
            tree.update_single_entry(id, &path)?;
        }

        let status = tree.entry(id).entry_status;
        if status.contains(EntryStatus::DELETED) {
            if let Some(parent) = parent {
                let parent_entry = tree.entry_mut(parent);
                parent_entry.entry_status.remove(EntryStatus::LIKELY);
                parent_entry.entry_status.insert(EntryStatus::CHANGED);
            }
        }

        // A deleted or replaced directory no longer has its stored
        // children; treat it as empty downstream.
        let entry = tree.entry(id);
        let had_or_has_children = entry.is_dir() || !entry.by_inode.is_empty();
        if had_or_has_children
            && (status.contains(EntryStatus::REPLACED)
                || (status.contains(EntryStatus::DELETED) && !ctx.action.spec().keep_children))
        {
            let entry = tree.entry_mut(id);
            entry.entry_count = 0;
            entry.by_inode.clear();
            entry.by_name.clear();
        }

        // Exactly removed (not replaced): the sub-entries will be found
        // missing through the parent's status.
        if status.contains(EntryStatus::DELETED) && !status.contains(EntryStatus::REPLACED) {
            break 'examine;
        }

        if tree.entry(id).is_dir() && tree.entry(id).entry_count == 0 {
            debug!("doing empty directory {:?}", tree.entry(id).name);
            check_dir_for_update(tree, id, ctx)?;
        }
    }

    if !parent_is_gone {
        if let Some(parent) = parent {
            tree.entry_mut(parent).child_index += 1;
            let parent_entry = tree.entry(parent);
            if parent_entry.child_index >= parent_entry.entry_count
                && parent_entry.do_full_child
            {
                // The last known child was seen; only additions remain.
                check_dir_for_update(tree, parent, ctx)?;
            }
        }
    }

    // Non-directories are dispatched here; directories are dispatched from
    // their finalization, except when they are simply gone.
    let entry = tree.entry(id);
    let replaced_into_dir =
        entry.is_dir() && entry.entry_status.contains(EntryStatus::REPLACED);
    if (entry.entry_status.contains(EntryStatus::DELETED) && !replaced_into_dir)
        || (entry.do_full_child && !entry.is_dir())
    {
        actions::dispatch(ctx.action, tree, id)?;
    }
    Ok(())
}

/// Finalizes a directory: runs the addition merge when the conditions ask
/// for it, then dispatches the directory to the action.
pub(crate) fn check_dir_for_update(
    tree: &mut Tree,
    dir: EntryId,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), EngineError> {
    if !tree.entry(dir).do_full_child {
        return Ok(());
    }

    let entry = tree.entry(dir);
    let wants_update = !entry.entry_status.is_empty()
        || ctx.session.options.checksum
        || entry.flags.intersects(EntryFlags::ADD | EntryFlags::CHECK);
    if ctx.session.options.recursive >= 0 && wants_update {
        if ctx.session.options.only_check_status {
            debug!("only check & set status - no update_dir");
        } else {
            update_dir(tree, dir, ctx)?;
        }
    }

    actions::dispatch(ctx.action, tree, dir)?;
    Ok(())
}
