use thiserror::Error;
use wf_core::{GraphError, ImportError, NodeId};

/// Why an editor command was refused. The message is shown to the user.
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("select a state or transition first")]
    NothingSelected,

    #[error("the clipboard is empty")]
    ClipboardEmpty,

    #[error("cannot paste: state `{0}` no longer exists")]
    MissingEndpoint(NodeId),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}
