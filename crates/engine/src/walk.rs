//! In-order traversal of the finished tree.

use tree::{EntryId, Tree};

use crate::error::EngineError;

/// Walks the tree in by-name order, calling `handler` on every entry whose
/// `do_full_child` bit is set and recursing into directories selected with
/// `do_full`.
///
/// Useful for output passes that want a stable, human-friendly order
/// instead of the dispatch order of the update pass.
pub fn do_sorted_tree(
    tree: &mut Tree,
    dir: EntryId,
    handler: &mut dyn FnMut(&Tree, EntryId) -> Result<(), EngineError>,
) -> Result<(), EngineError> {
    if tree.entry(dir).by_name.len() != tree.entry(dir).by_inode.len() {
        tree.sort_by_name(dir);
    }
    let children = tree.entry(dir).by_name.clone();
    for child in children {
        if tree.entry(child).do_full_child {
            handler(tree, child)?;
        }
        if tree.entry(child).do_full && tree.entry(child).is_dir() {
            do_sorted_tree(tree, child, handler)?;
        }
    }
    Ok(())
}
