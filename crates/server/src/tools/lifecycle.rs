//! sw_install, sw_activate and sw_sync: lifecycle signals for the worker.

use precache_client::{ActivationReport, InstallReport, ServiceWorker, SyncOutcome, WorkerState};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::HostError;

/// Output of sw_install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutput {
    #[serde(flatten)]
    pub report: InstallReport,
    pub state: WorkerState,
}

/// Output of sw_activate.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateOutput {
    #[serde(flatten)]
    pub report: ActivationReport,
    pub state: WorkerState,
}

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Sync tag that fired, e.g. "background-sync-todos".
    pub tag: String,
}

/// Output of sw_sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutput {
    pub tag: String,
    pub outcome: SyncOutcome,
}

pub async fn install_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;
    json_result(&InstallOutput { report, state: worker.state() })
}

pub async fn activate_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.activate().await?;
    json_result(&ActivateOutput { report, state: worker.state() })
}

pub async fn sync_impl(worker: &ServiceWorker, params: SyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.trim().to_string();
    if tag.is_empty() {
        return Err(HostError::InvalidInput("sync tag must not be empty".into()).into());
    }

    let outcome = worker.sync(&tag).await?;
    json_result(&SyncOutput { tag, outcome })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{json, worker};

    #[tokio::test]
    async fn test_install_then_activate() {
        let (worker, db) = worker("v2").await;
        db.open_generation("v1").await.unwrap();

        let installed = json(&install_impl(&worker).await.unwrap());
        assert_eq!(installed["generation"], "v2");
        assert_eq!(installed["state"], "installed");
        assert_eq!(installed["cached"].as_array().unwrap().len(), 2);

        let activated = json(&activate_impl(&worker).await.unwrap());
        assert_eq!(activated["state"], "activated");
        assert_eq!(activated["deleted"], serde_json::json!(["v1"]));
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let (worker, _) = worker("v1").await;
        let err = activate_impl(&worker).await.unwrap_err();
        assert!(err.message.starts_with("INVALID_STATE"));
    }

    #[tokio::test]
    async fn test_sync() {
        let (worker, _) = worker("v1").await;

        let done = json(&sync_impl(&worker, SyncParams { tag: "background-sync-todos".into() }).await.unwrap());
        assert_eq!(done["outcome"], "completed");

        let ignored = json(&sync_impl(&worker, SyncParams { tag: "other".into() }).await.unwrap());
        assert_eq!(ignored["outcome"], "ignored");

        assert!(sync_impl(&worker, SyncParams { tag: "  ".into() }).await.is_err());
    }
}
