//! Structured diagnostic events.
//!
//! The worker never logs directly. It emits [`Diagnostic`] values on a
//! [`Reporter`], which the host may forward to tracing, subscribe to, or drop.
//! Nothing in the worker reads these events back.

use serde::Serialize;
use tokio::sync::broadcast;

/// Something noteworthy happened inside the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    Installing { generation: String, seeds: usize },
    SeedCached { generation: String, url: String },
    SeedFailed { generation: String, url: String, reason: String },
    InstallComplete { generation: String, cached: usize },
    Activating { generation: String },
    GenerationDeleted { generation: String },
    DeleteFailed { generation: String, reason: String },
    ActivationComplete { generation: String, deleted: usize },
    ServedFromCache { url: String },
    FetchingFromNetwork { url: String },
    NetworkFailed { url: String, reason: String },
    OfflineFallback { url: String, navigation: bool },
    StoreReadFailed { url: String, reason: String },
    StoreWriteFailed { url: String, reason: String },
    Stored { generation: String, url: String },
    /// The generation was gone by the time a background write ran.
    WriteSkipped { generation: String, url: String },
    SyncStarted { tag: String },
    SyncComplete { tag: String },
    SyncFailed { tag: String, reason: String },
    PendingWritesAborted { count: usize },
}

impl Diagnostic {
    /// Mirror the event onto the tracing subscriber.
    pub fn trace(&self) {
        match self {
            Diagnostic::Installing { generation, seeds } => {
                tracing::info!(%generation, seeds, "installing generation")
            }
            Diagnostic::SeedCached { generation, url } => tracing::debug!(%generation, %url, "seed cached"),
            Diagnostic::SeedFailed { generation, url, reason } => {
                tracing::warn!(%generation, %url, %reason, "seed fetch failed")
            }
            Diagnostic::InstallComplete { generation, cached } => {
                tracing::info!(%generation, cached, "installation complete")
            }
            Diagnostic::Activating { generation } => tracing::info!(%generation, "activating generation"),
            Diagnostic::GenerationDeleted { generation } => tracing::info!(%generation, "deleted stale generation"),
            Diagnostic::DeleteFailed { generation, reason } => {
                tracing::warn!(%generation, %reason, "failed to delete stale generation")
            }
            Diagnostic::ActivationComplete { generation, deleted } => {
                tracing::info!(%generation, deleted, "activation complete")
            }
            Diagnostic::ServedFromCache { url } => tracing::debug!(%url, "serving from cache"),
            Diagnostic::FetchingFromNetwork { url } => tracing::debug!(%url, "fetching from network"),
            Diagnostic::NetworkFailed { url, reason } => tracing::warn!(%url, %reason, "network fetch failed"),
            Diagnostic::OfflineFallback { url, navigation } => {
                tracing::info!(%url, navigation, "serving offline fallback")
            }
            Diagnostic::StoreReadFailed { url, reason } => tracing::warn!(%url, %reason, "cache read failed"),
            Diagnostic::StoreWriteFailed { url, reason } => tracing::warn!(%url, %reason, "cache put failed"),
            Diagnostic::Stored { generation, url } => tracing::trace!(%generation, %url, "stored response"),
            Diagnostic::WriteSkipped { generation, url } => {
                tracing::debug!(%generation, %url, "generation no longer exists, write skipped")
            }
            Diagnostic::SyncStarted { tag } => tracing::info!(%tag, "background sync started"),
            Diagnostic::SyncComplete { tag } => tracing::info!(%tag, "background sync complete"),
            Diagnostic::SyncFailed { tag, reason } => tracing::error!(%tag, %reason, "background sync failed"),
            Diagnostic::PendingWritesAborted { count } => {
                tracing::warn!(count, "aborted pending cache writes on shutdown")
            }
        }
    }
}

/// Sink for diagnostic events.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Diagnostic);
}

/// Forwards every event to tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: Diagnostic) {
        event.trace();
    }
}

/// Forwards events to tracing and to any number of subscribers.
///
/// Slow subscribers lag and lose events; the sender never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastReporter {
    tx: broadcast::Sender<Diagnostic>,
}

impl BroadcastReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }
}

impl Reporter for BroadcastReporter {
    fn report(&self, event: Diagnostic) {
        event.trace();
        // no subscribers is fine
        let _ = self.tx.send(event);
    }
}
