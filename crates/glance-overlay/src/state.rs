//! Shared overlay state.
//!
//! One explicitly constructed context for the whole subsystem, held behind
//! a mutex by the manager and the tasks it spawns. The lock is never held
//! across an await point; the membership check-and-mark in the render
//! pipeline relies on that being a single uninterrupted step.

use std::collections::{HashMap, HashSet};

use glance_dom::NodeId;

use crate::viewer::ViewerState;

/// Everything the overlay knows about one spliced diagram container.
pub(crate) struct ContainerRecord {
    /// The container element itself.
    pub container: NodeId,
    /// Toolbar toggle button, mirrored on mode changes.
    pub toggle_btn: NodeId,
    /// Region holding the rendered markup.
    pub diagram_view: NodeId,
    /// Hidden region holding the original `pre`.
    pub code_view: NodeId,
    /// The original `pre` ancestor, restored on disable.
    pub original: NodeId,
    /// Interaction state machine for this container.
    pub viewer: ViewerState,
}

/// Process-wide overlay state.
///
/// `processed` holds plain node ids, so membership never extends the
/// lifetime of a block that external code removed from the document;
/// stale ids are pruned at the start of every scan. Invariant: a block is
/// a member iff it has an in-flight or completed render that has not been
/// reverted (plus the terminal empty-after-cleaning case).
///
/// `epoch` counts total resets. A render pipeline captures it when it
/// marks its block; a result carrying an older epoch is stale even if the
/// overlay has been re-enabled since, because the membership that mark
/// belonged to no longer exists.
#[derive(Default)]
pub(crate) struct OverlayState {
    /// Gate for scans and watcher callbacks.
    pub enabled: bool,
    /// Bumped by every disable; see the type docs.
    pub epoch: u64,
    /// Blocks with an in-flight or completed render.
    pub processed: HashSet<NodeId>,
    /// Live containers, keyed by container node.
    pub containers: HashMap<NodeId, ContainerRecord>,
}
