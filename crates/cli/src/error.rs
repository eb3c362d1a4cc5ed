use std::io;

/// Top-level errors of one fsvc invocation.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// An administrative-area operation failed.
    #[error(transparent)]
    Waa(#[from] waa::WaaError),

    /// An entry-tree or dir-file operation failed.
    #[error(transparent)]
    Tree(#[from] tree::TreeError),

    /// The update pass failed.
    #[error(transparent)]
    Engine(#[from] engine::EngineError),

    /// An action callback failed.
    #[error(transparent)]
    Action(#[from] actions::ActionError),

    /// Writing to the terminal failed.
    #[error("cannot write output: {0}")]
    Output(#[source] io::Error),

    /// The action needs at least one path argument.
    #[error("'{0}' needs at least one path argument")]
    MissingPaths(&'static str),
}
