//! Status rendering.

use tree::{EntryId, EntryStatus, EntryType, Tree};

/// Renders one status line for `id`, or `None` when the entry has nothing
/// to report.
///
/// The columns are existence (`N`ew, `D`eleted, `R`eplaced), content
/// (`C`hanged, `?` possibly changed), and `m`eta-data, followed by the
/// entry kind and its path relative to the working copy root.
#[must_use]
pub fn status_line(tree: &Tree, id: EntryId) -> Option<String> {
    let entry = tree.entry(id);
    let status = entry.entry_status;

    let existence = if status.contains(EntryStatus::DELETED | EntryStatus::REPLACED) {
        'R'
    } else if status.contains(EntryStatus::DELETED) {
        'D'
    } else if status.contains(EntryStatus::NEW) {
        'N'
    } else {
        '.'
    };
    let content = if status.contains(EntryStatus::CHANGED) {
        'C'
    } else if status.contains(EntryStatus::LIKELY) {
        '?'
    } else {
        '.'
    };
    let meta = if status.contains(EntryStatus::META_CHANGED) {
        'm'
    } else {
        '.'
    };

    if existence == '.' && content == '.' && meta == '.' {
        return None;
    }

    let kind = match entry.entry_type {
        EntryType::Directory => "dir",
        EntryType::Regular => "file",
        EntryType::Symlink => "link",
        EntryType::Device => "dev",
        EntryType::Ignored => "ign",
    };
    Some(format!(
        "{existence}{content}{meta}  {kind:<4} {}",
        tree.build_path(id).display()
    ))
}
