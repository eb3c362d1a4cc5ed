#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `actions` defines the contract between the WAA core and the concrete
//! commands (status, add, unversion, ...). The core never hard-codes action
//! identities; it only reads the descriptive [`ActionSpec`] fields and routes
//! per-entry work through [`Action::local_callback`] via [`dispatch`].
//!
//! # Design
//!
//! An action is split into two halves. The *spec* is a `'static` table entry
//! carrying the command names, the help text, and the behaviour flags the
//! core consults (`is_import_export` switches off the WAA root requirement,
//! `keep_children` preserves the children of deleted directories, and so on).
//! The *behaviour* is the [`Action`] trait: a mutable visitor that receives
//! every selected entry during a tree pass and an end-of-run hook.
//!
//! # Invariants
//!
//! - During one update pass each directory is dispatched exactly once and
//!   each non-directory exactly once; the callback must not rely on any
//!   other ordering than parents-after-children for directories.
//! - `local_uninit` runs at most once, after the last dispatch.

use std::io;

use tree::{EntryId, Tree};

/// Error surfaced by an action callback.
///
/// Callbacks are ordinary fallible visitors; any error aborts the current
/// tree pass and propagates to the top level.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Writing the action's output failed.
    #[error("cannot write action output: {0}")]
    Output(#[from] io::Error),
    /// The action rejected the entry or its state.
    #[error("{0}")]
    Failed(String),
}

/// Static description of one action, as the registry publishes it.
///
/// The WAA core reads only these fields; everything else about an action is
/// behind the [`Action`] trait.
#[derive(Clone, Copy, Debug)]
pub struct ActionSpec {
    /// Command names; the first one is canonical, the rest are aliases.
    pub names: &'static [&'static str],
    /// One-line help text.
    pub help_text: &'static str,
    /// The action works without a WAA root (export-like operation).
    pub is_import_export: bool,
    /// The action compares against the repository rather than the WAA.
    pub is_compare: bool,
    /// The action needs decoded file contents.
    pub is_decoder: bool,
    /// The action honours the output filter option.
    pub is_filter: bool,
    /// Children of deleted directories stay in the tree.
    pub keep_children: bool,
    /// User-defined properties survive this action.
    pub keep_user_prop: bool,
    /// Immediate value, e.g. the entry flag an add/unversion run applies.
    pub i_val: u32,
}

impl ActionSpec {
    /// A spec with all flags off; table entries override what they need.
    pub const DEFAULT: Self = Self {
        names: &[],
        help_text: "",
        is_import_export: false,
        is_compare: false,
        is_decoder: false,
        is_filter: false,
        keep_children: false,
        keep_user_prop: false,
        i_val: 0,
    };

    /// Returns the canonical command name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.names.first().copied().unwrap_or("")
    }

    /// Tests whether `name` matches the canonical name or an alias.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.names.contains(&name)
    }
}

/// Behaviour of one action during a tree pass.
pub trait Action {
    /// The static spec this behaviour belongs to.
    fn spec(&self) -> &'static ActionSpec;

    /// Per-entry dispatch target.
    ///
    /// Called once per selected entry; directories arrive after all their
    /// known children have been handled.
    fn local_callback(&mut self, tree: &Tree, entry: EntryId) -> Result<(), ActionError>;

    /// End-of-run hook, e.g. to finish a progress display.
    fn local_uninit(&mut self) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Routes one entry to the action's callback.
///
/// This is the single point through which the core hands entries to the
/// current action.
pub fn dispatch(
    action: &mut dyn Action,
    tree: &Tree,
    entry: EntryId,
) -> Result<(), ActionError> {
    action.local_callback(tree, entry)
}
