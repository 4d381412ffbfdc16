//! Lazy, memoizing adapter over a [`DiagramEngine`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{DiagramEngine, EngineError, EngineOptions};

/// Prefix of every render id allocated by [`EngineAdapter::next_id`].
const RENDER_ID_PREFIX: &str = "glance-diagram";

/// Process-wide handle to the diagram engine.
///
/// The adapter initializes the engine at most once: the first successful
/// [`ensure_ready`](Self::ensure_ready) memoizes readiness, failed attempts
/// leave it unready so a later call re-attempts. It also allocates the
/// unique, monotonically increasing render ids the engine contract needs.
///
/// The adapter is constructed once and kept for the life of the process;
/// disabling the overlay does not tear it down, so re-enabling reuses the
/// already-initialized engine.
pub struct EngineAdapter<E> {
    engine: E,
    options: EngineOptions,
    ready: AtomicBool,
    counter: AtomicU64,
}

impl<E: DiagramEngine> EngineAdapter<E> {
    /// Wrap an engine with the given initialize options.
    #[must_use]
    pub fn new(engine: E, options: EngineOptions) -> Self {
        Self {
            engine,
            options,
            ready: AtomicBool::new(false),
            counter: AtomicU64::new(0),
        }
    }

    /// Initialize the engine if it has not been initialized successfully
    /// yet. Idempotent; readiness is memoized on first success.
    ///
    /// # Errors
    ///
    /// Returns the engine's initialization error; the adapter stays
    /// unready and the next call re-attempts.
    pub async fn ensure_ready(&self) -> Result<(), EngineError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.engine.initialize(&self.options).await?;
        self.ready.store(true, Ordering::Release);
        tracing::debug!("diagram engine initialized");
        Ok(())
    }

    /// Whether a previous [`ensure_ready`](Self::ensure_ready) succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Allocate a fresh render id, unique for the life of the adapter.
    #[must_use]
    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{RENDER_ID_PREFIX}-{n}")
    }

    /// Access the wrapped engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Render diagram source into markup.
    ///
    /// # Errors
    ///
    /// Propagates the engine-reported render error.
    pub async fn render(&self, id: &str, source: &str) -> Result<String, EngineError> {
        self.engine.render(id, source).await
    }
}
