//! Overlay lifecycle and input routing.
//!
//! [`OverlayManager`] is the one explicitly constructed context holding
//! the document handle, the engine adapter, the configuration, and the
//! shared overlay state. Nothing here is process-global; embedders can
//! run several managers over several documents side by side.

use std::sync::{Arc, Mutex};

use glance_dom::{Document, NodeId};
use glance_engine::{DiagramEngine, EngineAdapter, EngineOptions};

use crate::config::OverlayConfig;
use crate::error::OverlayError;
use crate::render::run_scan;
use crate::state::{ContainerRecord, OverlayState};
use crate::viewer::{self, ViewerInput, ViewerState};
use crate::watcher::MutationWatcher;

/// Drives the detect, render, and interaction pipeline over one document.
pub struct OverlayManager<E> {
    doc: Arc<Document>,
    adapter: Arc<EngineAdapter<E>>,
    config: Arc<OverlayConfig>,
    state: Arc<Mutex<OverlayState>>,
    watcher: Mutex<Option<MutationWatcher>>,
}

impl<E: DiagramEngine> OverlayManager<E> {
    /// Build a manager over the document. The engine is wrapped in a
    /// lazy adapter; nothing renders until [`enable`](Self::enable).
    #[must_use]
    pub fn new(doc: Arc<Document>, engine: E, options: EngineOptions, config: OverlayConfig) -> Self {
        Self {
            doc,
            adapter: Arc::new(EngineAdapter::new(engine, options)),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(OverlayState::default())),
            watcher: Mutex::new(None),
        }
    }

    /// Turn the overlay on: initialize the engine, scan the whole
    /// document, and start watching for mutations. No-op when already
    /// enabled. Resolves once the initial scan has settled.
    ///
    /// # Errors
    ///
    /// [`OverlayError::EngineUnavailable`] when engine initialization
    /// fails; the overlay stays disabled and a later call retries.
    pub async fn enable(&self) -> Result<(), OverlayError> {
        if self.is_enabled() {
            return Ok(());
        }
        self.adapter.ensure_ready().await?;

        self.state.lock().unwrap().enabled = true;
        run_scan(&self.doc, &self.state, &self.adapter, &self.config).await;

        let watcher = MutationWatcher::spawn(
            Arc::clone(&self.doc),
            Arc::clone(&self.state),
            Arc::clone(&self.adapter),
            Arc::clone(&self.config),
        );
        // Overlapping enables can both reach this point; the replaced
        // watcher must not keep rescanning.
        if let Some(previous) = self.watcher.lock().unwrap().replace(watcher) {
            previous.stop();
        }

        tracing::info!("overlay enabled");
        Ok(())
    }

    /// Turn the overlay off: stop the watcher, splice every container
    /// back out, and reset all membership. Total reset; a later enable
    /// starts from a blank slate against the document as it then stands.
    /// Idempotent, and the engine adapter survives for reuse.
    pub fn disable(&self) {
        if let Some(watcher) = self.watcher.lock().unwrap().take() {
            watcher.stop();
        }

        let records: Vec<ContainerRecord> = {
            let mut st = self.state.lock().unwrap();
            if !st.enabled {
                return;
            }
            st.enabled = false;
            // Invalidates the marks of any render still in flight; its
            // result is discarded even if the overlay is re-enabled first.
            st.epoch += 1;
            st.processed.clear();
            st.containers.drain().map(|(_, record)| record).collect()
        };

        for record in records {
            self.restore(record);
        }
        tracing::info!("overlay disabled");
    }

    /// Dispatch to [`enable`](Self::enable) or [`disable`](Self::disable).
    ///
    /// # Errors
    ///
    /// Propagates the enable-side engine failure.
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), OverlayError> {
        if enabled {
            self.enable().await
        } else {
            self.disable();
            Ok(())
        }
    }

    /// Whether the overlay is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    /// Run one scan pass now, outside the watcher's schedule. No-op while
    /// disabled. Resolves once the pass has settled.
    pub async fn rescan(&self) {
        run_scan(&self.doc, &self.state, &self.adapter, &self.config).await;
    }

    /// The document this manager drives.
    #[must_use]
    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    /// Node ids of the live containers, in id order.
    #[must_use]
    pub fn containers(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.state.lock().unwrap().containers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Node ids of the blocks currently marked processed, in id order.
    #[must_use]
    pub fn processed_blocks(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.state.lock().unwrap().processed.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Snapshot of a container's viewer state.
    #[must_use]
    pub fn viewer_state(&self, container: NodeId) -> Option<ViewerState> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(&container)
            .map(|record| record.viewer)
    }

    /// Route one input to a container's viewer and write the resulting
    /// presentation into the document.
    ///
    /// # Errors
    ///
    /// [`OverlayError::UnknownContainer`] when no live container has that
    /// id; [`OverlayError::Dom`] when the container's nodes vanished
    /// between the transition and the presentation write.
    pub fn dispatch(&self, container: NodeId, input: ViewerInput) -> Result<(), OverlayError> {
        if matches!(input, ViewerInput::FullscreenToggle) {
            return self.toggle_fullscreen(container);
        }

        let (toggle_btn, diagram_view, code_view, snapshot) = {
            let mut st = self.state.lock().unwrap();
            let record = st
                .containers
                .get_mut(&container)
                .ok_or(OverlayError::UnknownContainer(container))?;
            match input {
                ViewerInput::ToggleMode => record.viewer.toggle_mode(),
                ViewerInput::ZoomIn => record.viewer.zoom(self.config.scale_step, &self.config),
                ViewerInput::ZoomOut => record.viewer.zoom(-self.config.scale_step, &self.config),
                ViewerInput::Wheel { delta_y, modifier } => {
                    record.viewer.wheel(delta_y, modifier, &self.config);
                }
                ViewerInput::Reset => record.viewer.reset(),
                ViewerInput::DragStart { x, y } => {
                    record.viewer.drag_start(x, y);
                }
                ViewerInput::DragMove { x, y } => {
                    record.viewer.drag_move(x, y);
                }
                ViewerInput::DragEnd => record.viewer.drag_end(),
                ViewerInput::FullscreenToggle => {}
            }
            (record.toggle_btn, record.diagram_view, record.code_view, record.viewer)
        };

        viewer::sync_presentation(&self.doc, toggle_btn, diagram_view, code_view, &snapshot)?;
        Ok(())
    }

    /// Enter fullscreen on the container, or leave fullscreen if any
    /// element currently holds it, whichever container that was. A denied
    /// request is logged and swallowed; the overlay keeps working without
    /// fullscreen.
    fn toggle_fullscreen(&self, container: NodeId) -> Result<(), OverlayError> {
        if !self.state.lock().unwrap().containers.contains_key(&container) {
            return Err(OverlayError::UnknownContainer(container));
        }
        if self.doc.fullscreen_element().is_some() {
            self.doc.exit_fullscreen();
            return Ok(());
        }
        if let Err(err) = self.doc.request_fullscreen(container) {
            tracing::warn!(container = %container, error = %err, "fullscreen request denied");
        }
        Ok(())
    }

    /// Splice one container back out, returning the original `pre` to the
    /// container's position. Tolerates externally mutated trees: a
    /// vanished container or original degrades to whatever cleanup is
    /// still possible.
    fn restore(&self, record: ContainerRecord) {
        if !self.doc.contains(record.container) {
            return;
        }
        if let Some(parent) = self.doc.parent(record.container) {
            if self.doc.contains(record.original) {
                let _ = self
                    .doc
                    .insert_before(parent, record.original, record.container);
            }
        }
        let _ = self.doc.remove(record.container);
    }
}
