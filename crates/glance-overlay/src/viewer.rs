//! Per-container zoom/pan/mode/fullscreen state machine.
//!
//! [`ViewerState`] holds the pure transition logic; the lifecycle code
//! binds one to each diagram container and writes the resulting
//! presentation back through the document after every transition. The
//! machine has no terminal state — it lives as long as its container.

use glance_dom::{Document, DomError, NodeId};

use crate::config::OverlayConfig;

/// Which of the two container regions is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    /// Rendered diagram markup is shown; the original code is hidden.
    Diagram,
    /// The original code is shown; the diagram is hidden.
    Code,
}

/// Toolbar and pointer input routed to a container's viewer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewerInput {
    /// Flip between diagram and code views.
    ToggleMode,
    /// Zoom in by one step.
    ZoomIn,
    /// Zoom out by one step.
    ZoomOut,
    /// Wheel input; only consumed when a modifier key is held, so normal
    /// page scrolling is never hijacked.
    Wheel {
        /// Positive values scroll away from the user (zoom out).
        delta_y: f64,
        /// Whether ctrl/meta was held.
        modifier: bool,
    },
    /// Reset zoom and pan.
    Reset,
    /// Pointer or touch press at document coordinates.
    DragStart { x: f64, y: f64 },
    /// Pointer or touch move at document coordinates.
    DragMove { x: f64, y: f64 },
    /// Pointer or touch release.
    DragEnd,
    /// Enter fullscreen on the container, or exit if already fullscreen.
    FullscreenToggle,
}

/// Toggle button title while the diagram is showing.
pub(crate) const TITLE_VIEW_CODE: &str = "View code";
/// Toggle button title while the code is showing.
pub(crate) const TITLE_VIEW_DIAGRAM: &str = "View diagram";

/// Zoom/pan/mode state of one diagram container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerState {
    /// Current zoom factor, kept within the configured bounds.
    pub scale: f64,
    /// Horizontal pan offset in pixels.
    pub translate_x: f64,
    /// Vertical pan offset in pixels.
    pub translate_y: f64,
    /// Whether a drag is in progress.
    pub dragging: bool,
    /// Visible region.
    pub mode: DisplayMode,
    drag_origin_x: f64,
    drag_origin_y: f64,
}

impl ViewerState {
    /// Initial state: unit scale, no pan, diagram visible.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            dragging: false,
            mode: DisplayMode::Diagram,
            drag_origin_x: 0.0,
            drag_origin_y: 0.0,
        }
    }

    /// Flip between diagram and code views. Involution: two toggles
    /// restore the previous display state.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            DisplayMode::Diagram => DisplayMode::Code,
            DisplayMode::Code => DisplayMode::Diagram,
        };
    }

    /// Apply a zoom delta, clamped to the configured bounds.
    ///
    /// At or below unit scale the pan resets to the origin; above it the
    /// pan is rescaled by the zoom ratio so the visual anchor stays put.
    pub fn zoom(&mut self, delta: f64, config: &OverlayConfig) {
        let old_scale = self.scale;
        self.scale = (self.scale + delta).clamp(config.min_scale, config.max_scale);

        if self.scale <= 1.0 {
            self.translate_x = 0.0;
            self.translate_y = 0.0;
        } else {
            let ratio = self.scale / old_scale;
            self.translate_x *= ratio;
            self.translate_y *= ratio;
        }
    }

    /// Wheel zoom. Only consumed when the modifier key is held; returns
    /// whether the input was consumed.
    pub fn wheel(&mut self, delta_y: f64, modifier: bool, config: &OverlayConfig) -> bool {
        if !modifier {
            return false;
        }
        let delta = if delta_y > 0.0 {
            -config.scale_step
        } else {
            config.scale_step
        };
        self.zoom(delta, config);
        true
    }

    /// Reset zoom and pan unconditionally.
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.translate_x = 0.0;
        self.translate_y = 0.0;
    }

    /// Begin a drag at the given pointer position. Gated on being zoomed
    /// in; returns whether the drag started.
    pub fn drag_start(&mut self, x: f64, y: f64) -> bool {
        if self.scale <= 1.0 {
            return false;
        }
        self.dragging = true;
        self.drag_origin_x = x - self.translate_x;
        self.drag_origin_y = y - self.translate_y;
        true
    }

    /// Update the pan from a pointer move. No-op unless dragging; returns
    /// whether the state changed.
    pub fn drag_move(&mut self, x: f64, y: f64) -> bool {
        if !self.dragging {
            return false;
        }
        self.translate_x = x - self.drag_origin_x;
        self.translate_y = y - self.drag_origin_y;
        true
    }

    /// End a drag. Idempotent regardless of prior state.
    pub fn drag_end(&mut self) {
        self.dragging = false;
    }

    /// CSS transform for the diagram view.
    #[must_use]
    pub fn transform(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            self.translate_x, self.translate_y, self.scale
        )
    }

    /// Cursor affordance for the diagram view.
    #[must_use]
    pub fn cursor(&self) -> &'static str {
        if self.dragging {
            "grabbing"
        } else if self.scale > 1.0 {
            "grab"
        } else {
            "default"
        }
    }
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Write the viewer's presentation into the container's nodes: region
/// visibility, transform, cursor, and the toggle button's mirrored state.
pub(crate) fn sync_presentation(
    doc: &Document,
    toggle_btn: NodeId,
    diagram_view: NodeId,
    code_view: NodeId,
    viewer: &ViewerState,
) -> Result<(), DomError> {
    match viewer.mode {
        DisplayMode::Diagram => {
            doc.set_attr(
                diagram_view,
                "style",
                &format!(
                    "display:flex; cursor:{}; transform:{}; transform-origin:center center",
                    viewer.cursor(),
                    viewer.transform()
                ),
            )?;
            doc.set_attr(code_view, "style", "display:none")?;
            doc.set_attr(toggle_btn, "data-showing", "diagram")?;
            doc.set_attr(toggle_btn, "title", TITLE_VIEW_CODE)?;
        }
        DisplayMode::Code => {
            doc.set_attr(diagram_view, "style", "display:none")?;
            doc.set_attr(code_view, "style", "display:block")?;
            doc.set_attr(toggle_btn, "data-showing", "code")?;
            doc.set_attr(toggle_btn, "title", TITLE_VIEW_DIAGRAM)?;
        }
    }
    Ok(())
}
