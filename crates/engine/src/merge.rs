//! The merge kernel: one stored directory against its live listing.

use std::cmp::Ordering;

use tracing::debug;

use tree::{EntryId, EntryStatus, EntryType, Tree};
use waa::CwdGuard;

use crate::build::build_tree;
use crate::context::UpdateContext;
use crate::enumerate::{dir_enum, EnumOrder};
use crate::error::EngineError;

/// Checks a stored directory for additions.
///
/// Enumerates the live directory sorted by name and runs a two-pointer
/// merge against the stored children. Names present only in the live
/// listing are new entries: they are ignore-checked, linked in, dispatched,
/// and - when selection wants their contents - recursed into via
/// [`build_tree`]. Names present only in the stored list are deletions,
/// which the stream pass has already noticed; the merge skips them.
///
/// The working directory is saved with an open handle and restored on every
/// exit path.
pub fn update_dir(
    tree: &mut Tree,
    dir: EntryId,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), EngineError> {
    let guard = CwdGuard::new().map_err(EngineError::Waa)?;
    let path = tree.build_path(dir);
    debug!("update_dir: chdir({:?})", path);
    std::env::set_current_dir(&path).map_err(|err| EngineError::io("chdir", &path, err))?;
    let result = update_dir_in_cwd(tree, dir, ctx);
    drop(guard);
    result
}

fn update_dir_in_cwd(
    tree: &mut Tree,
    dir: EntryId,
    ctx: &mut UpdateContext<'_>,
) -> Result<(), EngineError> {
    let live = dir_enum(ctx.session.waa_stat(), EnumOrder::ByName)?;
    debug!(
        "update_dir: direnum found {}; old has {}",
        live.len(),
        tree.entry(dir).entry_count
    );

    let mut new_children: Vec<EntryId> = Vec::new();
    // An empty listing means no additions; deletions are found elsewhere.
    if !live.is_empty() {
        tree.sort_by_name(dir);
        let stored = tree.entry(dir).by_name.clone();

        let mut i_old = 0;
        let mut i_cur = 0;
        while i_cur < live.len() {
            let order = if i_old < stored.len() {
                tree.entry(stored[i_old]).name.cmp(&live[i_cur].name)
            } else {
                Ordering::Greater
            };
            match order {
                Ordering::Equal => {
                    i_cur += 1;
                    i_old += 1;
                }
                Ordering::Less => {
                    // Stored name with no live counterpart: deleted; the
                    // stream pass has or will notice.
                    i_old += 1;
                }
                Ordering::Greater => {
                    let item = &live[i_cur];
                    let id = tree.new_detached(dir, &item.name, item.stat);
                    if tree.entry(id).entry_type == EntryType::Ignored
                        || ctx.ignore.is_ignored(tree, id)
                    {
                        debug!("ignoring entry {:?}", item.name);
                        tree.entry_mut(id).entry_type = EntryType::Ignored;
                    } else {
                        debug!("found a new one!");
                        tree.entry_mut(id).entry_status = EntryStatus::NEW;
                        actions::dispatch(ctx.action, tree, id)?;
                        ctx.session.approx_entry_count += 1;
                        tree.set_to_handle_bits(id);

                        if tree.entry(id).is_dir() && tree.entry(id).do_full {
                            let name = tree.entry(id).name.clone();
                            std::env::set_current_dir(&name)
                                .map_err(|err| EngineError::io("chdir", &name, err))?;
                            build_tree(tree, id, ctx)?;
                            std::env::set_current_dir("..")
                                .map_err(|err| EngineError::io("chdir back from", &name, err))?;
                        }
                        new_children.push(id);
                    }
                    i_cur += 1;
                }
            }
        }
    }

    // The old entries have been checked now; if anything is new this
    // directory definitely changed.
    tree.entry_mut(dir).entry_status.remove(EntryStatus::LIKELY);
    if !new_children.is_empty() {
        tree.new_entries(dir, &new_children);
        tree.entry_mut(dir).entry_status |= EntryStatus::CHANGED | EntryStatus::CHILD_CHANGED;
    }
    debug!("update_dir reports {} new found", new_children.len());
    Ok(())
}
