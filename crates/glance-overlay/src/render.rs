//! Per-block render pipeline.
//!
//! Each detected block runs an isolated pipeline: membership check and
//! mark (a single non-suspending step, the sole guard against overlapping
//! scans double-processing a block), text cleaning, the suspending render
//! call, and finally the container splice. Failures unmark the block so a
//! later scan can retry; no error ever escapes to abort sibling blocks.

use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

use glance_dom::{Document, NodeId};
use glance_engine::{DiagramEngine, EngineAdapter};

use crate::config::OverlayConfig;
use crate::state::{ContainerRecord, OverlayState};
use crate::viewer::{self, ViewerState, TITLE_VIEW_CODE};
use crate::{clean, detect};

/// Class of the composite container spliced in place of a rendered block.
pub(crate) const CONTAINER_CLASS: &str = "diagram-container";
const TOOLBAR_CLASS: &str = "diagram-toolbar";
const BUTTON_CLASS: &str = "diagram-btn";
const TOGGLE_BUTTON_CLASS: &str = "diagram-btn diagram-toggle-btn";
const DIAGRAM_VIEW_CLASS: &str = "diagram-view";
const CODE_VIEW_CLASS: &str = "diagram-code";

/// One full scan pass: detect blocks, then run every block's pipeline.
///
/// Pipelines are spawned in document order; because renders suspend, they
/// may complete in any order. The pass itself resolves only once every
/// pipeline has settled, so callers can await quiescence.
pub(crate) async fn run_scan<E: DiagramEngine>(
    doc: &Arc<Document>,
    state: &Arc<Mutex<OverlayState>>,
    adapter: &Arc<EngineAdapter<E>>,
    config: &Arc<OverlayConfig>,
) {
    if !state.lock().unwrap().enabled {
        return;
    }
    prune_stale(doc, state);

    let blocks = detect::find_blocks(doc, config);
    if blocks.is_empty() {
        return;
    }
    tracing::debug!(candidates = blocks.len(), "scanning for diagram blocks");

    let mut tasks = JoinSet::new();
    for block in blocks {
        let doc = Arc::clone(doc);
        let state = Arc::clone(state);
        let adapter = Arc::clone(adapter);
        tasks.spawn(async move {
            process_block(&doc, &state, &adapter, block).await;
        });
    }
    while tasks.join_next().await.is_some() {}
}

/// Drop membership entries and container records whose nodes external
/// code has removed from the document.
fn prune_stale(doc: &Document, state: &Mutex<OverlayState>) {
    let mut st = state.lock().unwrap();
    st.processed.retain(|id| doc.contains(*id));
    st.containers.retain(|id, _| doc.contains(*id));
}

/// Run one block through the pipeline. See the module docs for the
/// isolation and idempotency guarantees.
async fn process_block<E: DiagramEngine>(
    doc: &Arc<Document>,
    state: &Arc<Mutex<OverlayState>>,
    adapter: &Arc<EngineAdapter<E>>,
    block: NodeId,
) {
    if state.lock().unwrap().processed.contains(&block) {
        return;
    }

    // A block without a wrapping <pre>, or one already living inside a
    // container, is a structural mismatch: skipped silently, not marked.
    let Some(pre) = closest_tag(doc, block, "pre") else {
        return;
    };
    if inside_container(doc, pre) {
        return;
    }

    // Check-and-mark under one lock acquisition, before the first await.
    // The epoch captured with the mark ties the eventual render result to
    // this membership generation.
    let epoch = {
        let mut st = state.lock().unwrap();
        if !st.enabled || !st.processed.insert(block) {
            return;
        }
        st.epoch
    };

    let raw = doc.text(block).unwrap_or_default();
    let source = clean::clean(&raw);
    if source.is_empty() {
        // Terminal, not retryable: the mark stays so the block is not
        // re-cleaned on every subsequent scan.
        return;
    }

    let render_id = adapter.next_id();
    match adapter.render(&render_id, &source).await {
        Ok(markup) => splice_container(doc, state, block, pre, epoch, &render_id, &markup),
        Err(err) => {
            state.lock().unwrap().processed.remove(&block);
            tracing::warn!(block = %block, error = %err, "diagram render failed");
        }
    }
}

/// Replace the block's `pre` ancestor with a freshly built container.
///
/// The render call suspended, so the world may have changed: a disable
/// since the mark makes the result stale (discarded) regardless of the
/// current enabled flag, and a vanished ancestor degrades the splice to a
/// no-op.
fn splice_container(
    doc: &Arc<Document>,
    state: &Arc<Mutex<OverlayState>>,
    block: NodeId,
    pre: NodeId,
    epoch: u64,
    render_id: &str,
    markup: &str,
) {
    {
        let mut st = state.lock().unwrap();
        if !st.enabled || st.epoch != epoch {
            // Unmark only while disabled: after a re-enable the block may
            // already carry a fresh mark owned by the new scan.
            if !st.enabled {
                st.processed.remove(&block);
            }
            tracing::debug!(block = %block, "discarding stale render result");
            return;
        }
    }

    if !doc.is_attached(pre) {
        tracing::debug!(block = %block, "render target vanished before splice");
        return;
    }
    let Some(parent) = doc.parent(pre) else {
        return;
    };

    let built = build_container(doc, render_id, markup);

    if doc.insert_before(parent, built.container, pre).is_err() {
        // The parent mutated underneath us; drop the orphan container.
        let _ = doc.remove(built.container);
        tracing::debug!(block = %block, "splice point vanished, dropping container");
        return;
    }
    // Moving the pre detaches it from its old position automatically.
    if doc.append_child(built.code_view, pre).is_err() {
        let _ = doc.remove(built.container);
        return;
    }

    state.lock().unwrap().containers.insert(
        built.container,
        ContainerRecord {
            container: built.container,
            toggle_btn: built.toggle_btn,
            diagram_view: built.diagram_view,
            code_view: built.code_view,
            original: pre,
            viewer: ViewerState::new(),
        },
    );
    tracing::debug!(container = %built.container, render = render_id, "diagram rendered");
}

struct BuiltContainer {
    container: NodeId,
    toggle_btn: NodeId,
    diagram_view: NodeId,
    code_view: NodeId,
}

/// Assemble the detached container subtree: toolbar, diagram view with
/// the rendered markup, and the (initially hidden) code view.
fn build_container(doc: &Document, render_id: &str, markup: &str) -> BuiltContainer {
    let container = doc.create_element("div");
    let _ = doc.set_attr(container, "class", CONTAINER_CLASS);

    let toolbar = doc.create_element("div");
    let _ = doc.set_attr(toolbar, "class", TOOLBAR_CLASS);

    let toggle_btn = doc.create_element("button");
    let _ = doc.set_attr(toggle_btn, "class", TOGGLE_BUTTON_CLASS);
    let _ = doc.set_attr(toggle_btn, "title", TITLE_VIEW_CODE);
    let _ = doc.set_attr(toggle_btn, "data-showing", "diagram");
    let _ = doc.append_child(toolbar, toggle_btn);

    for title in ["Zoom in", "Zoom out", "Reset view", "Fullscreen"] {
        let btn = doc.create_element("button");
        let _ = doc.set_attr(btn, "class", BUTTON_CLASS);
        let _ = doc.set_attr(btn, "title", title);
        let _ = doc.append_child(toolbar, btn);
    }

    let diagram_view = doc.create_element("div");
    let _ = doc.set_attr(diagram_view, "class", DIAGRAM_VIEW_CLASS);
    let _ = doc.set_attr(diagram_view, "data-render-id", render_id);
    let _ = doc.set_text(diagram_view, markup);

    let code_view = doc.create_element("div");
    let _ = doc.set_attr(code_view, "class", CODE_VIEW_CLASS);
    let _ = doc.set_attr(code_view, "style", "display:none");

    let _ = doc.append_child(container, toolbar);
    let _ = doc.append_child(container, diagram_view);
    let _ = doc.append_child(container, code_view);

    let initial = ViewerState::new();
    let _ = viewer::sync_presentation(doc, toggle_btn, diagram_view, code_view, &initial);

    BuiltContainer {
        container,
        toggle_btn,
        diagram_view,
        code_view,
    }
}

/// Nearest node (self included) with the given tag, walking upward.
fn closest_tag(doc: &Document, id: NodeId, tag: &str) -> Option<NodeId> {
    if doc.tag(id).as_deref() == Some(tag) {
        return Some(id);
    }
    doc.ancestors(id)
        .into_iter()
        .find(|a| doc.tag(*a).as_deref() == Some(tag))
}

/// Whether the node (self included) sits inside an overlay container.
fn inside_container(doc: &Document, id: NodeId) -> bool {
    std::iter::once(id)
        .chain(doc.ancestors(id))
        .any(|n| doc.has_class(n, CONTAINER_CLASS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    use glance_engine::{EngineError, EngineOptions};

    /// Engine whose renders block until the test releases them.
    struct GatedEngine {
        release: Notify,
        calls: AtomicUsize,
    }

    impl GatedEngine {
        fn new() -> Self {
            Self {
                release: Notify::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DiagramEngine for GatedEngine {
        async fn initialize(&self, _options: &EngineOptions) -> Result<(), EngineError> {
            Ok(())
        }

        async fn render(&self, id: &str, _source: &str) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(format!("<svg data-id=\"{id}\"></svg>"))
        }
    }

    /// Engine that renders immediately, optionally failing every call.
    struct InstantEngine {
        fail: bool,
        calls: AtomicUsize,
    }

    impl InstantEngine {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl DiagramEngine for InstantEngine {
        async fn initialize(&self, _options: &EngineOptions) -> Result<(), EngineError> {
            Ok(())
        }

        async fn render(&self, id: &str, _source: &str) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EngineError::Render {
                    id: id.to_owned(),
                    message: "syntax error".to_owned(),
                })
            } else {
                Ok("<svg></svg>".to_owned())
            }
        }
    }

    struct Fixture<E> {
        doc: Arc<Document>,
        state: Arc<Mutex<OverlayState>>,
        adapter: Arc<EngineAdapter<E>>,
        config: Arc<OverlayConfig>,
        pre: NodeId,
        block: NodeId,
    }

    fn fixture<E: DiagramEngine>(engine: E, text: &str) -> Fixture<E> {
        let doc = Arc::new(Document::new());
        let pre = doc.create_element("pre");
        let block = doc.create_element("code");
        doc.set_attr(block, "class", "language-mermaid").unwrap();
        doc.set_text(block, text).unwrap();
        doc.append_child(doc.root(), pre).unwrap();
        doc.append_child(pre, block).unwrap();

        let state = Arc::new(Mutex::new(OverlayState {
            enabled: true,
            ..OverlayState::default()
        }));
        Fixture {
            doc,
            state,
            adapter: Arc::new(EngineAdapter::new(engine, EngineOptions::default())),
            config: Arc::new(OverlayConfig::default()),
            pre,
            block,
        }
    }

    #[tokio::test]
    async fn test_success_splices_container_in_place() {
        let f = fixture(InstantEngine::new(false), "graph TD\nA-->B");
        run_scan(&f.doc, &f.state, &f.adapter, &f.config).await;

        let st = f.state.lock().unwrap();
        assert_eq!(st.containers.len(), 1);
        assert!(st.processed.contains(&f.block));
        drop(st);

        // The pre moved inside the container's code view, at the pre's
        // former position under the root.
        let container = f.doc.children(f.doc.root())[0];
        assert!(f.doc.has_class(container, "diagram-container"));
        assert_eq!(f.doc.parent(f.pre).map(|p| f.doc.has_class(p, "diagram-code")), Some(true));
    }

    #[tokio::test]
    async fn test_failure_unmarks_block_and_leaves_document() {
        let f = fixture(InstantEngine::new(true), "graph TD\nA-->B");
        let before = f.doc.outline();
        run_scan(&f.doc, &f.state, &f.adapter, &f.config).await;

        let st = f.state.lock().unwrap();
        assert!(st.processed.is_empty());
        assert!(st.containers.is_empty());
        drop(st);
        assert_eq!(f.doc.outline(), before);
    }

    #[tokio::test]
    async fn test_empty_after_cleaning_is_terminal() {
        let f = fixture(InstantEngine::new(false), "<div></div>");
        run_scan(&f.doc, &f.state, &f.adapter, &f.config).await;
        run_scan(&f.doc, &f.state, &f.adapter, &f.config).await;

        assert_eq!(f.adapter.engine().calls.load(Ordering::SeqCst), 0);
        let st = f.state.lock().unwrap();
        assert!(st.processed.contains(&f.block));
        assert!(st.containers.is_empty());
    }

    #[tokio::test]
    async fn test_rescan_skips_processed_blocks() {
        let f = fixture(InstantEngine::new(false), "graph TD\nA-->B");
        run_scan(&f.doc, &f.state, &f.adapter, &f.config).await;
        run_scan(&f.doc, &f.state, &f.adapter, &f.config).await;

        assert_eq!(f.adapter.engine().calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.state.lock().unwrap().containers.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_result_after_disable_is_discarded() {
        let f = fixture(GatedEngine::new(), "graph TD\nA-->B");
        let before = f.doc.outline();

        let scan = tokio::spawn({
            let doc = Arc::clone(&f.doc);
            let state = Arc::clone(&f.state);
            let adapter = Arc::clone(&f.adapter);
            let config = Arc::clone(&f.config);
            async move { run_scan(&doc, &state, &adapter, &config).await }
        });

        // Let the pipeline mark the block and suspend in the render call,
        // then disable and release the render.
        while f.adapter.engine().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        f.state.lock().unwrap().enabled = false;
        f.adapter.engine().release.notify_one();
        scan.await.unwrap();

        let st = f.state.lock().unwrap();
        assert!(st.containers.is_empty());
        assert!(st.processed.is_empty());
        drop(st);
        assert_eq!(f.doc.outline(), before);
    }

    #[tokio::test]
    async fn test_splice_is_noop_when_ancestor_vanishes_mid_render() {
        let f = fixture(GatedEngine::new(), "graph TD\nA-->B");

        let scan = tokio::spawn({
            let doc = Arc::clone(&f.doc);
            let state = Arc::clone(&f.state);
            let adapter = Arc::clone(&f.adapter);
            let config = Arc::clone(&f.config);
            async move { run_scan(&doc, &state, &adapter, &config).await }
        });

        while f.adapter.engine().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        f.doc.remove(f.pre).unwrap();
        f.adapter.engine().release.notify_one();
        scan.await.unwrap();

        assert!(f.state.lock().unwrap().containers.is_empty());
        assert_eq!(f.doc.outline(), "body\n");
    }

    #[tokio::test]
    async fn test_render_pending_across_disable_enable_cycle_is_discarded() {
        let f = fixture(GatedEngine::new(), "graph TD\nA-->B");

        let first = tokio::spawn({
            let doc = Arc::clone(&f.doc);
            let state = Arc::clone(&f.state);
            let adapter = Arc::clone(&f.adapter);
            let config = Arc::clone(&f.config);
            async move { run_scan(&doc, &state, &adapter, &config).await }
        });
        while f.adapter.engine().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Disable and immediately re-enable while the first render is
        // still pending. Its mark belongs to the cleared membership.
        {
            let mut st = f.state.lock().unwrap();
            st.enabled = false;
            st.processed.clear();
            st.epoch += 1;
            st.enabled = true;
        }

        let second = tokio::spawn({
            let doc = Arc::clone(&f.doc);
            let state = Arc::clone(&f.state);
            let adapter = Arc::clone(&f.adapter);
            let config = Arc::clone(&f.config);
            async move { run_scan(&doc, &state, &adapter, &config).await }
        });
        while f.adapter.engine().calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        f.adapter.engine().release.notify_one();
        f.adapter.engine().release.notify_one();
        first.await.unwrap();
        second.await.unwrap();

        // Only the second render splices; the pre-cycle result is stale.
        let st = f.state.lock().unwrap();
        assert_eq!(st.containers.len(), 1);
        assert!(st.processed.contains(&f.block));
        drop(st);
        assert_eq!(f.doc.outline().matches("diagram-container").count(), 1);
    }

    #[tokio::test]
    async fn test_block_without_pre_ancestor_is_skipped_unmarked() {
        let doc = Arc::new(Document::new());
        let block = doc.create_element("code");
        doc.set_attr(block, "class", "language-mermaid").unwrap();
        doc.set_text(block, "graph TD\nA-->B").unwrap();
        doc.append_child(doc.root(), block).unwrap();

        let state = Arc::new(Mutex::new(OverlayState {
            enabled: true,
            ..OverlayState::default()
        }));
        let adapter = Arc::new(EngineAdapter::new(
            InstantEngine::new(false),
            EngineOptions::default(),
        ));
        let config = Arc::new(OverlayConfig::default());

        run_scan(&doc, &state, &adapter, &config).await;

        let st = state.lock().unwrap();
        assert!(st.processed.is_empty());
        assert!(st.containers.is_empty());
    }

}
