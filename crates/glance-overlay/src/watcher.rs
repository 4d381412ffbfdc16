//! Mutation watcher: keeps the overlay current against a live document.
//!
//! A spawned task consumes the document's mutation stream through a
//! bounded queue. Relevance is judged on explicit markers only; blocks
//! detectable only by the content heuristic are picked up by the next
//! triggered rescan rather than triggering one themselves. Bursts are
//! coalesced: after a relevant batch the task waits out the rescan delay,
//! drains everything else that queued up, and runs one scan.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;

use glance_dom::{Document, MutationBatch};
use glance_engine::{DiagramEngine, EngineAdapter};

use crate::config::OverlayConfig;
use crate::detect;
use crate::render::run_scan;
use crate::state::OverlayState;

/// Handle to the background watcher task. Dropping the handle aborts the
/// task, so a replaced or discarded watcher never keeps rescanning.
pub(crate) struct MutationWatcher {
    handle: JoinHandle<()>,
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MutationWatcher {
    /// Subscribe to the document and spawn the watcher loop.
    pub(crate) fn spawn<E: DiagramEngine>(
        doc: Arc<Document>,
        state: Arc<Mutex<OverlayState>>,
        adapter: Arc<EngineAdapter<E>>,
        config: Arc<OverlayConfig>,
    ) -> Self {
        let mut rx = doc.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(batch) => {
                        if !state.lock().unwrap().enabled {
                            continue;
                        }
                        if !batch_is_relevant(&doc, &batch) {
                            continue;
                        }
                        tokio::time::sleep(Duration::from_millis(config.rescan_delay_ms)).await;
                        drain(&mut rx);
                        run_scan(&doc, &state, &adapter, &config).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Batches were dropped, so relevance can no longer
                        // be judged; a full rescan is always safe.
                        tracing::debug!(skipped, "mutation stream lagged, rescanning");
                        run_scan(&doc, &state, &adapter, &config).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { handle }
    }

    /// Stop the watcher task. Any rescan already past its membership
    /// marks finishes via the stale-result guards, not by unwinding.
    pub(crate) fn stop(self) {
        drop(self);
    }
}

/// Discard every batch already queued. Dropping unexamined batches is
/// safe here: their nodes are in the document, and the caller is about to
/// run a full scan that discovers them regardless of relevance.
fn drain(rx: &mut tokio::sync::broadcast::Receiver<MutationBatch>) {
    loop {
        match rx.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

/// Whether a batch warrants a rescan: some added subtree carries an
/// explicit diagram marker. Heuristic-only content never triggers.
fn batch_is_relevant(doc: &Document, batch: &MutationBatch) -> bool {
    batch
        .added
        .iter()
        .any(|id| doc.subtree(*id).into_iter().any(|n| detect::matches_explicit(doc, n)))
}
