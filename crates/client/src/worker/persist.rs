//! Fire-and-forget cache writes.
//!
//! Strategies hand responses to the [`Persister`] and return to the caller
//! immediately. Writes run as tracked tokio tasks that own their data, so a
//! dropped request never cancels or crashes them. Shutdown drains with a
//! bound and aborts whatever is still pending.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinSet;

use precache_core::{CacheStore, Diagnostic, Reporter, ResourceRequest, ResourceResponse};

/// Tracks background store writes.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn CacheStore>,
    reporter: Arc<dyn Reporter>,
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Persister {
    pub fn new(store: Arc<dyn CacheStore>, reporter: Arc<dyn Reporter>) -> Self {
        Self { store, reporter, tasks: Arc::new(Mutex::new(JoinSet::new())) }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Schedule a write of `response` under `request` in `generation`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, generation: &str, request: &ResourceRequest, response: &ResourceResponse) {
        let store = Arc::clone(&self.store);
        let reporter = Arc::clone(&self.reporter);
        let generation = generation.to_string();
        let request = request.clone();
        let response = response.clone();

        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let url = request.url.to_string();
            match store.put(&generation, &request, &response).await {
                Ok(true) => reporter.report(Diagnostic::Stored { generation, url }),
                Ok(false) => reporter.report(Diagnostic::WriteSkipped { generation, url }),
                Err(e) => reporter.report(Diagnostic::StoreWriteFailed { url, reason: e.to_string() }),
            }
        });
    }

    /// Number of writes not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks().len()
    }

    /// Wait for every write scheduled so far.
    pub async fn flush(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "cache write task did not complete");
            }
        }
    }

    /// Wait up to `timeout` for pending writes, then abort the rest.
    ///
    /// Returns the number of writes aborted.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks());
        let finished = tokio::time::timeout(timeout, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "cache write task did not complete");
                }
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }

        let aborted = tasks.len();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        self.reporter.report(Diagnostic::PendingWritesAborted { count: aborted });
        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{RecordingReporter, SlowStore, html, local, store};

    #[tokio::test]
    async fn test_schedule_then_flush_persists() {
        let db = store("v1").await;
        let reporter = Arc::new(RecordingReporter::default());
        let persister = Persister::new(Arc::new(db.clone()), reporter.clone());

        let request = local("/app.js");
        let response = html("/app.js", "console.log('todo')");
        persister.schedule("v1", &request, &response);
        persister.flush().await;

        assert_eq!(persister.pending(), 0);
        assert_eq!(db.get("v1", &request).await.unwrap(), Some(response));
        assert!(reporter.events().iter().any(|e| matches!(e, Diagnostic::Stored { .. })));
    }

    #[tokio::test]
    async fn test_write_survives_dropped_caller() {
        let db = store("v1").await;
        let persister = Persister::new(Arc::new(db.clone()), Arc::new(RecordingReporter::default()));

        let request = local("/index.html");
        {
            let persister = persister.clone();
            let request = request.clone();
            let (scheduled_tx, scheduled_rx) = tokio::sync::oneshot::channel();
            let caller = tokio::spawn(async move {
                persister.schedule("v1", &request, &html("/index.html", "<h1>todo</h1>"));
                let _ = scheduled_tx.send(());
                std::future::pending::<()>().await;
            });
            scheduled_rx.await.unwrap();
            caller.abort();
            let _ = caller.await;
        }

        persister.flush().await;
        assert!(db.get("v1", &request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_into_deleted_generation_is_skipped() {
        let db = store("v1").await;
        db.delete_generation("v1").await.unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let persister = Persister::new(Arc::new(db.clone()), reporter.clone());

        persister.schedule("v1", &local("/app.js"), &html("/app.js", "late"));
        persister.flush().await;

        assert!(db.generation_names().await.unwrap().is_empty());
        assert!(reporter.events().iter().any(|e| matches!(e, Diagnostic::WriteSkipped { .. })));
    }

    #[tokio::test]
    async fn test_drain_aborts_after_timeout() {
        let reporter = Arc::new(RecordingReporter::default());
        let persister = Persister::new(Arc::new(SlowStore), reporter.clone());

        persister.schedule("v1", &local("/slow.js"), &html("/slow.js", "x"));
        let aborted = persister.drain(Duration::from_millis(20)).await;

        assert_eq!(aborted, 1);
        assert!(reporter.events().contains(&Diagnostic::PendingWritesAborted { count: 1 }));
    }
}
