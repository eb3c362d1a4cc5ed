#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `waa` manages the *working-copy administrative area*: the on-disk
//! scratch space where fsvc keeps the serialized entry tree and other
//! per-working-copy artifacts. A working copy is keyed by the MD5 digest of
//! its absolute path, fanned out as `<root>/<hex2>/<hex2>/<hex28>/`, so
//! lookups never scan directories and unrelated working copies never
//! collide.
//!
//! # Design
//!
//! All state one invocation needs lives in a [`Session`]: the WAA and
//! configuration roots from the environment, the cached stat of the WAA
//! root (so the enumerator can refuse to descend into it), the cached
//! working directory, and the per-run [`Options`]. Writes to the area go
//! through [`WaaWriter`], which writes a temporary file and renames it over
//! the destination on [`WaaWriter::commit`]; a dropped or aborted writer
//! unlinks its temporary, so readers only ever observe the previous or the
//! new contents, never a partial file.
//!
//! [`Session::find_common_base`] implements base discovery: given the
//! command-line paths it computes their common prefix, walks upward until a
//! registered working copy answers an existence probe, changes into that
//! base, and rewrites the arguments relative to it.
//!
//! # Errors
//!
//! Everything returns [`WaaError`]. [`WaaError::NotFound`] doubles as a
//! silent probe result ("no such artifact", "no working copy here") and is
//! routinely matched away by callers.

mod base;
mod cwd;
mod error;
mod paths;
mod session;
mod store;

pub use base::CommonBase;
pub use cwd::{save_cwd, CwdGuard};
pub use error::WaaError;
pub use paths::{normalize_path, Area};
pub use session::{Options, Session, CONF_ENV, WAA_ENV};
pub use store::{StorageDir, WaaWriter, DIR_EXT};
