//! The work functions behind the shipped actions.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use actions::{Action, ActionError, ActionSpec};
use engine::{build_tree, read_or_build_tree, NoIgnores, UpdateContext};
use tracing::debug;
use tree::{EntryFlags, EntryId, EntryStat, Tree};
use waa::{Area, Session, WaaError, DIR_EXT};

use crate::error::CliError;
use crate::output::status_line;
use crate::registry;

/// Action behaviour that prints a status line per dispatched entry.
struct StatusAction {
    spec: &'static ActionSpec,
}

impl Action for StatusAction {
    fn spec(&self) -> &'static ActionSpec {
        self.spec
    }

    fn local_callback(&mut self, tree: &Tree, entry: EntryId) -> Result<(), ActionError> {
        if let Some(line) = status_line(tree, entry) {
            let mut out = io::stdout().lock();
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

/// Serializes the tree into the working copy's dir-file.
fn save_tree(session: &mut Session, wc_path: &Path, tree: &mut Tree) -> Result<(), CliError> {
    tree.prune_deleted();
    let mut writer = session.open_write(wc_path, Area::Waa, DIR_EXT)?;
    let info = tree::write_tree(tree, &mut writer)?;
    writer.commit()?;
    session.approx_entry_count = u64::from(info.entry_count);
    debug!("saved {} entries", info.entry_count);
    Ok(())
}

/// `status`: load, update, report; never persists.
pub fn work_status(session: &mut Session, paths: &[PathBuf]) -> Result<(), CliError> {
    let common = session.find_common_base(paths)?;
    if !common.found {
        return Err(WaaError::NoWorkingCopy.into());
    }
    let mut action = StatusAction {
        spec: &registry::STATUS,
    };
    let mut ignore = NoIgnores;
    let mut ctx = UpdateContext {
        session: &mut *session,
        action: &mut action,
        ignore: &mut ignore,
    };
    read_or_build_tree(&common.normalized, &common.base, false, &mut ctx)?;
    Ok(())
}

/// `add` / `unversion`: load, update, flag the named entries, persist.
pub fn work_add_unversion(
    session: &mut Session,
    spec: &'static ActionSpec,
    paths: &[PathBuf],
) -> Result<(), CliError> {
    if paths.is_empty() {
        return Err(CliError::MissingPaths(spec.name()));
    }
    let common = session.find_common_base(paths)?;
    if !common.found {
        return Err(WaaError::NoWorkingCopy.into());
    }

    let mut action = StatusAction { spec };
    let mut ignore = NoIgnores;
    let mut ctx = UpdateContext {
        session: &mut *session,
        action: &mut action,
        ignore: &mut ignore,
    };
    let mut tree = read_or_build_tree(&common.normalized, &common.base, false, &mut ctx)?;

    let flag = EntryFlags::from_bits(spec.i_val);
    for path in &common.normalized {
        let id = tree.traverse(path, true, flag)?;
        tree.entry_mut(id).flags.insert(flag);
    }

    save_tree(session, &common.base, &mut tree)
}

/// `_build-new-list`: ignore the stored list, enumerate everything anew,
/// persist the result.
pub fn work_build(session: &mut Session, paths: &[PathBuf]) -> Result<(), CliError> {
    let common = session.find_base(paths)?;
    if !common.found {
        // Nothing registered yet: the common base becomes the working
        // copy root.
        std::env::set_current_dir(&common.base)
            .map_err(|err| WaaError::Io {
                action: "chdir",
                path: common.base.clone(),
                source: err,
            })?;
        session.wc_path = Some(common.base.clone());
    }

    let meta = fs::symlink_metadata(".").map_err(|err| WaaError::Io {
        action: "lstat",
        path: PathBuf::from("."),
        source: err,
    })?;
    let mut tree = Tree::with_root(".".into(), EntryStat::from_metadata(&meta));
    {
        let root = tree.entry_mut(Tree::ROOT);
        root.do_full = true;
        root.do_full_child = true;
    }

    let mut action = StatusAction {
        spec: &registry::BUILD,
    };
    let mut ignore = NoIgnores;
    let mut ctx = UpdateContext {
        session: &mut *session,
        action: &mut action,
        ignore: &mut ignore,
    };
    build_tree(&mut tree, Tree::ROOT, &mut ctx)?;

    save_tree(session, &common.base, &mut tree)?;
    session.make_info_link(&common.base, "_base", &common.base)?;
    Ok(())
}

/// `info`: print the stored list's header data.
pub fn work_info(session: &mut Session, paths: &[PathBuf]) -> Result<(), CliError> {
    let common = session.find_common_base(paths)?;
    if !common.found {
        return Err(WaaError::NoWorkingCopy.into());
    }
    let bytes = session.read_byext(&common.base, Area::Waa, DIR_EXT)?;
    let (_tree, _blocks, info) = tree::read_tree(&bytes, None)?;

    let mut out = io::stdout().lock();
    writeln!(out, "working copy: {}", common.base.display()).map_err(CliError::Output)?;
    writeln!(out, "entries:      {}", info.entry_count).map_err(CliError::Output)?;
    writeln!(out, "max path:     {}", info.max_path_len).map_err(CliError::Output)?;
    Ok(())
}

/// `help`: list the known actions.
pub fn work_help() -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    for spec in registry::ACTIONS {
        let aliases = spec.names[1..].join(", ");
        if aliases.is_empty() {
            writeln!(out, "{:16} {}", spec.name(), spec.help_text).map_err(CliError::Output)?;
        } else {
            writeln!(
                out,
                "{:16} {} (aliases: {aliases})",
                spec.name(),
                spec.help_text
            )
            .map_err(CliError::Output)?;
        }
    }
    Ok(())
}
