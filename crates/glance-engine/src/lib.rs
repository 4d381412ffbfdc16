//! Render-engine seam for the glance overlay.
//!
//! The overlay never talks to a concrete diagram engine directly. It depends
//! on the [`DiagramEngine`] trait and drives it through [`EngineAdapter`],
//! which owns the one-time asynchronous initialization, the memoized
//! readiness flag, and the monotonically increasing render-id counter.
//!
//! How and when the underlying engine is loaded is the embedder's concern;
//! the adapter only requires that `initialize` is idempotent and that
//! `render` fails with an engine-reported error for malformed input.

mod adapter;
mod error;
mod options;

pub use adapter::EngineAdapter;
pub use error::EngineError;
pub use options::{EngineOptions, FlowchartOptions};

/// An external diagram-rendering engine.
///
/// `initialize` configures the engine (idempotent); `render` converts
/// diagram source text into markup, failing asynchronously with an
/// engine-defined error for invalid syntax or internal faults.
pub trait DiagramEngine: Send + Sync + 'static {
    /// Configure the engine. Safe to call more than once.
    fn initialize(
        &self,
        options: &EngineOptions,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Render `source` into markup. `id` must be unique per call so the
    /// engine can key internal state without collisions.
    fn render(
        &self,
        id: &str,
        source: &str,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;
}
