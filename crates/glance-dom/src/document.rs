//! Arena-backed document tree with stable node identity.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::error::DomError;

/// Capacity of the mutation broadcast channel. Observers that fall this far
/// behind see a lag error and should fall back to a full rescan.
const MUTATION_CHANNEL_CAPACITY: usize = 256;

/// Stable identity of a node in a [`Document`].
///
/// Ids are plain copyable keys. They never extend the lifetime of the node
/// they name; after [`Document::remove`] drops a subtree, its ids stop
/// resolving and every accessor treats them as absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One batch of tree insertions, in insertion order.
///
/// Each entry is the root of an inserted subtree; descendants of an added
/// root are not listed separately.
#[derive(Clone, Debug)]
pub struct MutationBatch {
    /// Roots of the inserted subtrees.
    pub added: Vec<NodeId>,
}

struct NodeData {
    tag: String,
    attrs: HashMap<String, String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            attrs: HashMap::new(),
            text: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

struct TreeState {
    nodes: HashMap<NodeId, NodeData>,
    root: NodeId,
    next_id: u64,
    fullscreen: Option<NodeId>,
    fullscreen_allowed: bool,
}

impl TreeState {
    fn node(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes.get(&id).ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::NodeNotFound(id))
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes.get(&current).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Unlink `id` from its parent, leaving its subtree intact.
    fn unlink(&mut self, id: NodeId) -> Result<(), DomError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            if let Ok(data) = self.node_mut(parent) {
                data.children.retain(|c| *c != id);
            }
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    /// Pre-order walk of `id` and its descendants.
    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if let Some(data) = self.nodes.get(&id) {
            out.push(id);
            for child in &data.children {
                self.collect_subtree(*child, out);
            }
        }
    }

    /// Drop the fullscreen element once it is no longer part of the tree.
    fn settle_fullscreen(&mut self) {
        if let Some(fs) = self.fullscreen {
            if !self.nodes.contains_key(&fs) || !self.is_attached(fs) {
                self.fullscreen = None;
            }
        }
    }
}

/// A mutable document tree shared between the overlay and external code.
///
/// All operations lock an internal mutex for their duration; the lock is
/// never held across an await point by this crate.
pub struct Document {
    state: Mutex<TreeState>,
    mutations: broadcast::Sender<MutationBatch>,
}

impl Document {
    /// Create an empty document consisting of a single `body` root.
    #[must_use]
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeData::new("body"));
        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(TreeState {
                nodes,
                root,
                next_id: 1,
                fullscreen: None,
                fullscreen_allowed: true,
            }),
            mutations,
        }
    }

    fn locked(&self) -> MutexGuard<'_, TreeState> {
        self.state.lock().unwrap()
    }

    fn emit_added(&self, added: Vec<NodeId>) {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.mutations.send(MutationBatch { added });
    }

    /// The root node (`body`).
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.locked().root
    }

    /// Create a detached element with the given tag.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut state = self.locked();
        let id = NodeId(state.next_id);
        state.next_id += 1;
        state.nodes.insert(id, NodeData::new(tag));
        id
    }

    /// Whether `id` still resolves to a live node (attached or not).
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.locked().nodes.contains_key(&id)
    }

    /// Whether `id` is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.locked().is_attached(id)
    }

    /// Tag name of the node, if it exists.
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.locked().nodes.get(&id).map(|n| n.tag.clone())
    }

    /// Own text content of the node, if it exists and has any.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<String> {
        self.locked().nodes.get(&id).and_then(|n| n.text.clone())
    }

    /// Set the node's own text content.
    pub fn set_text(&self, id: NodeId, text: &str) -> Result<(), DomError> {
        self.locked().node_mut(id)?.text = Some(text.to_owned());
        Ok(())
    }

    /// Attribute value, if the node exists and carries the attribute.
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.locked()
            .nodes
            .get(&id)
            .and_then(|n| n.attrs.get(name).cloned())
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attr(&self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.locked()
            .node_mut(id)?
            .attrs
            .insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    /// Whether the node's `class` attribute contains `class` as a
    /// whitespace-separated token.
    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == class))
    }

    /// Parent of the node, if attached to one.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.locked().nodes.get(&id).and_then(|n| n.parent)
    }

    /// Children of the node, in document order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.locked()
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Ancestor chain of the node, nearest first, ending at the root.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let state = self.locked();
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = state.nodes.get(&current).and_then(|n| n.parent) {
            out.push(parent);
            current = parent;
        }
        out
    }

    /// The node and its descendants, in pre-order (document order).
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let state = self.locked();
        let mut out = Vec::new();
        state.collect_subtree(id, &mut out);
        out
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// An attached `child` is moved: it is unlinked from its current parent
    /// first, exactly like `appendChild` in a browser tree. A batch is
    /// emitted only when the insertion lands in the attached tree;
    /// assembling a detached subtree is invisible to observers until the
    /// subtree root itself is inserted.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let observed = {
            let mut state = self.locked();
            state.node(parent)?;
            state.node(child)?;
            if Self::creates_cycle(&state, parent, child) {
                return Err(DomError::InvalidInsertion);
            }
            state.unlink(child)?;
            state.node_mut(parent)?.children.push(child);
            state.node_mut(child)?.parent = Some(parent);
            state.is_attached(parent)
        };
        if observed {
            self.emit_added(vec![child]);
        }
        Ok(())
    }

    /// Insert `new` as a child of `parent`, immediately before `reference`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        new: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        let observed = {
            let mut state = self.locked();
            state.node(new)?;
            let position = state
                .node(parent)?
                .children
                .iter()
                .position(|c| *c == reference)
                .ok_or(DomError::InvalidInsertion)?;
            if Self::creates_cycle(&state, parent, new) {
                return Err(DomError::InvalidInsertion);
            }
            state.unlink(new)?;
            // Unlinking may have shifted the reference position when both
            // nodes share a parent.
            let position = state
                .node(parent)?
                .children
                .iter()
                .position(|c| *c == reference)
                .unwrap_or(position);
            state.node_mut(parent)?.children.insert(position, new);
            state.node_mut(new)?.parent = Some(parent);
            state.is_attached(parent)
        };
        if observed {
            self.emit_added(vec![new]);
        }
        Ok(())
    }

    /// Unlink the node from its parent, keeping its subtree alive for later
    /// re-insertion.
    pub fn detach(&self, id: NodeId) -> Result<(), DomError> {
        let mut state = self.locked();
        if id == state.root {
            return Err(DomError::InvalidInsertion);
        }
        state.node(id)?;
        state.unlink(id)?;
        state.settle_fullscreen();
        Ok(())
    }

    /// Unlink the node and drop it and all of its descendants.
    ///
    /// Ids of dropped nodes stop resolving; this is how external code
    /// destroys content the overlay may still hold ids for.
    pub fn remove(&self, id: NodeId) -> Result<(), DomError> {
        let mut state = self.locked();
        if id == state.root {
            return Err(DomError::InvalidInsertion);
        }
        state.node(id)?;
        state.unlink(id)?;
        let mut doomed = Vec::new();
        state.collect_subtree(id, &mut doomed);
        for node in doomed {
            state.nodes.remove(&node);
        }
        state.settle_fullscreen();
        Ok(())
    }

    fn creates_cycle(state: &TreeState, parent: NodeId, child: NodeId) -> bool {
        if parent == child {
            return true;
        }
        let mut current = parent;
        while let Some(up) = state.nodes.get(&current).and_then(|n| n.parent) {
            if up == child {
                return true;
            }
            current = up;
        }
        false
    }

    /// Subscribe to insertion batches.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MutationBatch> {
        self.mutations.subscribe()
    }

    /// Request fullscreen on the node.
    ///
    /// Denied when the embedder disallows fullscreen, the node is detached,
    /// or another element is already fullscreen.
    pub fn request_fullscreen(&self, id: NodeId) -> Result<(), DomError> {
        let mut state = self.locked();
        state.node(id)?;
        if !state.fullscreen_allowed || state.fullscreen.is_some() || !state.is_attached(id) {
            return Err(DomError::FullscreenDenied);
        }
        state.fullscreen = Some(id);
        Ok(())
    }

    /// Leave fullscreen. No-op when nothing is fullscreen.
    pub fn exit_fullscreen(&self) {
        self.locked().fullscreen = None;
    }

    /// The element currently displayed fullscreen, if any.
    #[must_use]
    pub fn fullscreen_element(&self) -> Option<NodeId> {
        self.locked().fullscreen
    }

    /// Control whether fullscreen requests are granted (default: granted).
    pub fn set_fullscreen_allowed(&self, allowed: bool) {
        self.locked().fullscreen_allowed = allowed;
    }

    /// Indented textual outline of the attached tree, for diagnostics and
    /// structural comparison in tests. Attributes other than `class` are
    /// omitted so presentation-only changes do not affect the outline.
    #[must_use]
    pub fn outline(&self) -> String {
        let state = self.locked();
        let mut out = String::new();
        Self::write_outline(&state, state.root, 0, &mut out);
        out
    }

    fn write_outline(state: &TreeState, id: NodeId, depth: usize, out: &mut String) {
        let Some(data) = state.nodes.get(&id) else {
            return;
        };
        let _ = write!(out, "{}{}", "  ".repeat(depth), data.tag);
        if let Some(class) = data.attrs.get("class") {
            let _ = write!(out, ".{}", class.split_whitespace().collect::<Vec<_>>().join("."));
        }
        if let Some(text) = &data.text {
            let _ = write!(out, " {text:?}");
        }
        out.push('\n');
        for child in &data.children {
            Self::write_outline(state, *child, depth + 1, out);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
