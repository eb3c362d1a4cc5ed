use std::io;
use std::path::PathBuf;

/// Errors of the updater layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An entry-tree or dir-file operation failed.
    #[error(transparent)]
    Tree(#[from] tree::TreeError),

    /// An administrative-area operation failed.
    #[error(transparent)]
    Waa(#[from] waa::WaaError),

    /// The current action's callback failed.
    #[error(transparent)]
    Action(#[from] actions::ActionError),

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
}

impl EngineError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
