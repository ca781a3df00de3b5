//! Background sync extension point.
//!
//! Only the trigger contract exists: a tagged sync event runs a
//! [`SyncProcedure`]. The default procedure does nothing and succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use precache_core::{Diagnostic, Error, Reporter};

/// Tag that triggers deferred todo reconciliation.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync-todos";

/// Work run when the sync tag fires.
#[async_trait]
pub trait SyncProcedure: Send + Sync {
    async fn reconcile(&self) -> Result<(), Error>;
}

/// Reconciliation that has nothing to reconcile.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSync;

#[async_trait]
impl SyncProcedure for NoopSync {
    async fn reconcile(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Completed,
    /// The tag is not one this worker handles.
    Ignored,
}

/// Dispatches sync triggers to the reconciliation procedure.
#[derive(Clone)]
pub struct SyncHook {
    tag: String,
    procedure: Arc<dyn SyncProcedure>,
    reporter: Arc<dyn Reporter>,
}

impl SyncHook {
    pub fn new(tag: impl Into<String>, procedure: Arc<dyn SyncProcedure>, reporter: Arc<dyn Reporter>) -> Self {
        Self { tag: tag.into(), procedure, reporter }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Run the procedure if `tag` matches.
    ///
    /// A failing procedure is reported and its error returned, so the host
    /// can schedule a retry.
    pub async fn on_sync(&self, tag: &str) -> Result<SyncOutcome, Error> {
        if tag != self.tag {
            tracing::debug!(%tag, "ignoring unknown sync tag");
            return Ok(SyncOutcome::Ignored);
        }

        self.reporter.report(Diagnostic::SyncStarted { tag: tag.to_string() });
        match self.procedure.reconcile().await {
            Ok(()) => {
                self.reporter.report(Diagnostic::SyncComplete { tag: tag.to_string() });
                Ok(SyncOutcome::Completed)
            }
            Err(e) => {
                self.reporter.report(Diagnostic::SyncFailed { tag: tag.to_string(), reason: e.to_string() });
                Err(e)
            }
        }
    }
}
