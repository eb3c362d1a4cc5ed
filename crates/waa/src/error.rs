use std::io;
use std::path::PathBuf;

/// Errors of the administrative-area layer.
#[derive(Debug, thiserror::Error)]
pub enum WaaError {
    /// An environment variable is unset, too short, or not a directory.
    #[error("environment variable {var} should be set to a directory")]
    BadEnvironment {
        /// Name of the offending variable.
        var: &'static str,
    },

    /// The WAA root does not exist.
    #[error(
        "stat() of WAA path '{}' failed: {source}. Does your local storage area exist?",
        path.display()
    )]
    WaaRootMissing {
        /// The configured WAA root.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The WAA root was requested but this session runs without one
    /// (import/export operation).
    #[error("this operation needs the administrative area, but none is configured")]
    NoWaaRoot,

    /// A filesystem operation failed.
    #[error("cannot {action} '{}': {source}", path.display())]
    Io {
        /// What was attempted.
        action: &'static str,
        /// The path the operation ran on.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The probed artifact or working copy does not exist.
    ///
    /// Returned silently; callers decide whether this is fatal.
    #[error("file not present")]
    NotFound,

    /// The current working directory was removed under us.
    #[error("cannot get the current directory")]
    CwdRemoved,

    /// No registered working copy was found above the argument paths.
    #[error("could not find a working copy with a matching base")]
    NoWorkingCopy,

    /// An argument other than the working copy root was given to an action
    /// that only accepts the root.
    #[error("only a working copy root is a valid path")]
    NotWcRoot,

    /// The current working directory exceeds the supported length.
    #[error("you have mighty long paths - more than {0} bytes are not supported")]
    PathTooLong(usize),
}

impl WaaError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
