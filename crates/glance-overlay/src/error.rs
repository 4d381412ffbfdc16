//! Overlay error taxonomy.
//!
//! Only two classes of failure surface to callers: the engine being
//! unavailable at enable time, and document faults while driving a viewer.
//! Per-block render failures never propagate — each block's pipeline is
//! isolated, reports through `tracing`, and leaves the block eligible for
//! retry on the next scan.

use glance_dom::{DomError, NodeId};
use glance_engine::EngineError;

/// Errors surfaced by the overlay's public operations.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Engine initialization failed; `enable` aborts cleanly and leaves the
    /// overlay disabled. Not retried automatically.
    #[error("diagram engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),
    /// Viewer input was dispatched to a node that is not a live overlay
    /// container.
    #[error("no overlay container at {0}")]
    UnknownContainer(NodeId),
    /// The document rejected an operation.
    #[error(transparent)]
    Dom(#[from] DomError),
}
