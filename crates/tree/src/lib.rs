#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `tree` holds the in-memory entry tree of one working copy and its
//! persistent form, the *dir-file*. One [`Entry`] describes one filesystem
//! object (file, directory, symlink, device); a [`Tree`] is the arena that
//! owns all entries of a working copy, rooted at [`Tree::ROOT`].
//!
//! # Design
//!
//! Entries live in one growable arena and refer to each other through
//! [`EntryId`] indices, never through references. This mirrors the on-disk
//! `file_index` scheme: the dir-file stores a parent's 1-based record
//! position instead of an inode number, so the loader can rebuild all
//! parent/child links in a single forward pass. A directory keeps two sorted
//! views over the same child set: `by_inode` for the streaming passes (disk
//! order) and `by_name` for the merge against a live directory listing.
//!
//! The [`dirfile`] module writes the tree with parents strictly before
//! children and approximately sorted by inode, and reads it back while
//! checking every framing invariant; [`blocks`] tracks the contiguous arena
//! ranges a load produced so the updater can stream over them.
//!
//! # Invariants
//!
//! - Every non-root entry has a parent, and the parent's child views contain
//!   it exactly once.
//! - Within a directory, `by_inode` is sorted by (device, inode) and
//!   `by_name` lexicographically by name.
//! - In a dir-file the root is the first record and every `parent_idx`
//!   points strictly backwards.
//!
//! # Errors
//!
//! All fallible operations return [`TreeError`]. Structural damage to a
//! dir-file is reported through [`TreeError::Damaged`] with a uniform
//! user-facing message; a missing dir-file is the dedicated, often silently
//! handled [`TreeError::NoDirFile`].

pub mod blocks;
pub mod dirfile;
mod entry;
mod error;
mod record;
mod tree;

pub use blocks::{Block, EntryBlocks};
pub use dirfile::{read_tree, write_tree, DirFileInfo, HEADER_LEN, WAA_VERSION};
pub use entry::{Entry, EntryFlags, EntryStat, EntryStatus, EntryType};
pub use error::TreeError;
pub use tree::{EntryId, Tree};
