//! Engine error taxonomy.

/// Errors surfaced by the engine seam.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Engine acquisition or configuration failed; the adapter stays
    /// unready and a later `ensure_ready` call re-attempts.
    #[error("engine initialization failed: {0}")]
    Init(String),
    /// The engine rejected a specific render request (syntax error or
    /// internal engine fault).
    #[error("render {id} failed: {message}")]
    Render {
        /// Render id the failure belongs to.
        id: String,
        /// Engine-reported message.
        message: String,
    },
}
