//! Diagram preview overlay for a live, externally mutated document.
//!
//! The overlay watches a [`glance_dom::Document`] for code blocks that carry
//! diagram source, renders them through a [`glance_engine::DiagramEngine`],
//! and splices an interactive container (toolbar, zoomable diagram view,
//! hidden original code) into the tree in place of each block.
//!
//! # Architecture
//!
//! - [`detect`]: finds candidate blocks via explicit class markers and a
//!   content heuristic
//! - [`clean`]: normalizes raw block text before rendering
//! - `render`: the per-block pipeline with its at-most-once guarantee
//! - [`viewer`]: the per-container zoom/pan/mode/fullscreen state machine
//! - `watcher`: reacts to tree insertions with one coalesced rescan per burst
//! - [`OverlayManager`]: process-wide enable/disable/query surface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use glance_dom::Document;
//! use glance_engine::EngineOptions;
//! use glance_overlay::{OverlayConfig, OverlayManager};
//!
//! let doc = Arc::new(Document::new());
//! let manager = OverlayManager::new(
//!     Arc::clone(&doc),
//!     engine, // any DiagramEngine implementation
//!     EngineOptions::default(),
//!     OverlayConfig::default(),
//! );
//! manager.enable().await?;
//! ```

pub mod clean;
mod config;
pub mod detect;
mod error;
mod manager;
mod render;
mod state;
pub mod viewer;
mod watcher;

pub use config::OverlayConfig;
pub use error::OverlayError;
pub use manager::OverlayManager;
pub use viewer::{DisplayMode, ViewerInput, ViewerState};

pub use glance_dom::{Document, DomError, MutationBatch, NodeId};
pub use glance_engine::{DiagramEngine, EngineAdapter, EngineError, EngineOptions};
