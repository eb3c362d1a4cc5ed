//! # Overview
//!
//! `engine` keeps the stored entry tree synchronized with the live
//! filesystem. Its central pass, [`update_tree`], streams over the entries
//! a dir-file load produced, re-stats the selected ones, and finalizes
//! every directory exactly once - after all its known children have been
//! seen - by running the sorted merge in [`update_dir`] that discovers
//! additions. Deletions fall out of the stream pass itself; additions fall
//! out of the merge; replacements are both at once.
//!
//! # Design
//!
//! The pass structure mirrors the dir-file: parents come first, so by the
//! time a directory's child counter reaches its persisted entry count,
//! every stored child has been examined and only the live-versus-stored
//! name merge remains. Recursion into newly discovered directories goes
//! through [`build_tree`], which enumerates inside the directory with the
//! working directory moved there - all directory recursion brackets the
//! working directory with a [`waa::CwdGuard`] or an explicit return
//! `chdir`, so every exit path restores it.
//!
//! Selection is driven by three bits per entry (`do_full`,
//! `do_full_child`, `do_a_child`) seeded by [`partial_update`] from the
//! command-line paths and inherited downwards during the stream.
//!
//! The actual action work stays behind the [`actions::Action`] trait; the
//! engine only decides *when* each entry is dispatched.

mod build;
mod context;
mod enumerate;
mod error;
mod ignore;
mod merge;
mod partial;
mod updater;
mod walk;

pub use build::build_tree;
pub use context::UpdateContext;
pub use enumerate::{dir_enum, EnumOrder, LiveEntry};
pub use error::EngineError;
pub use ignore::{IgnoreMatcher, NoIgnores};
pub use merge::update_dir;
pub use partial::{partial_update, read_or_build_tree};
pub use updater::update_tree;
pub use walk::do_sorted_tree;
