//! Document tree errors.

use crate::document::NodeId;

/// Errors reported by [`Document`](crate::Document) operations.
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    /// The node id does not resolve to a live node in this document.
    #[error("node {0} does not exist in this document")]
    NodeNotFound(NodeId),
    /// The requested insertion is structurally invalid (reference node is
    /// not a child of the parent, or the move would create a cycle).
    #[error("invalid insertion point")]
    InvalidInsertion,
    /// The fullscreen request was refused (node detached, another element
    /// already fullscreen, or the embedder denies fullscreen).
    #[error("fullscreen request denied")]
    FullscreenDenied,
}
