use std::io;
use std::path::PathBuf;

/// Errors of the entry tree and dir-file layer.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// No dir-file exists for this working copy.
    ///
    /// This is a probe result as much as an error; most callers handle it
    /// silently (first invocation, `_build-new-list`, ...).
    #[error("no entry list exists for this working copy")]
    NoDirFile,

    /// The dir-file failed a structural validation.
    #[error(
        "the entries file seems to be damaged -- {detail}.\n\
         If you know what you are doing you could try 'sync-repos' to\n\
         rebuild it from the repository (but please read the documentation)"
    )]
    Damaged {
        /// Which validation failed, in user-readable form.
        detail: &'static str,
    },

    /// A filesystem operation failed.
    #[error("cannot {action} '{}': {source}", path.display())]
    Io {
        /// What was attempted, e.g. `lstat`.
        action: &'static str,
        /// The path the operation ran on.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// Writing the dir-file failed.
    #[error("cannot write the entries file: {0}")]
    Write(#[source] io::Error),

    /// A path argument names neither a known entry nor an existing file.
    #[error("entry '{}' is not known", .0.display())]
    UnknownEntry(PathBuf),

    /// A path argument contains components the tree cannot address.
    #[error("invalid path component in '{}'", .0.display())]
    InvalidPath(PathBuf),

    /// The header fields did not fit the fixed-width header line.
    #[error("the entry tree does not fit the dir-file header")]
    HeaderSpace,

    /// The per-entry load callback reported an error.
    #[error("per-entry callback failed")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TreeError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
