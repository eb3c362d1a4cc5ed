//! Initial tree construction below a directory.

use tracing::debug;

use tree::{EntryId, EntryStatus, EntryType, Tree};

use crate::context::UpdateContext;
use crate::enumerate::{dir_enum, EnumOrder};
use crate::error::EngineError;

/// Enumerates the directory behind `dir` and records every child as new,
/// recursing into subdirectories while the recursion option allows it.
///
/// The working directory must be the directory behind `dir`; recursion
/// moves it down and back up again. Children the ignore matcher rejects
/// are marked [`EntryType::Ignored`] and detached afterwards; everything
/// else is dispatched to the action, subdirectories after their contents.
pub fn build_tree(
    tree: &mut Tree,
    dir: EntryId,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), EngineError> {
    let live = dir_enum(ctx.session.waa_stat(), EnumOrder::ByInode)?;
    debug!("found {} entries ...", live.len());

    for item in &live {
        let id = tree.new_detached(dir, &item.name, item.stat);
        tree.attach(dir, id);
    }
    tree.sort_by_inode(dir);

    let mut have_ignored = false;
    let mut have_found = false;
    let children = tree.entry(dir).by_inode.clone();
    for id in children {
        // Unversionable kinds (fifos, sockets) arrive pre-typed as
        // ignored; the matcher adds the user-configured patterns.
        if tree.entry(id).entry_type == EntryType::Ignored || ctx.ignore.is_ignored(tree, id) {
            debug!("ignoring entry {:?}", tree.entry(id).name);
            tree.entry_mut(id).entry_type = EntryType::Ignored;
            have_ignored = true;
            continue;
        }

        tree.entry_mut(id).entry_status = EntryStatus::NEW;
        ctx.session.approx_entry_count += 1;
        have_found = true;

        if tree.entry(id).is_dir() && ctx.session.options.recursive > 0 {
            let name = tree.entry(id).name.clone();
            std::env::set_current_dir(&name)
                .map_err(|err| EngineError::io("chdir", &name, err))?;
            build_tree(tree, id, ctx)?;
            // This can fail if the parent directories have been removed.
            std::env::set_current_dir("..")
                .map_err(|err| EngineError::io("chdir back from", &name, err))?;
        }

        actions::dispatch(ctx.action, tree, id)?;
    }

    if have_ignored {
        tree.free_marked(dir);
    }
    if have_found {
        tree.entry_mut(dir).entry_status |= EntryStatus::CHANGED | EntryStatus::CHILD_CHANGED;
    }
    Ok(())
}
