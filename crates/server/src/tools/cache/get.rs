//! cache_get tool implementation.
//!
//! Reads the stored response for a GET of a URL.

use precache_client::ServiceWorker;
use precache_client::fetch::canonicalize;
use precache_core::{CacheDb, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::tools::fetch::ResponseView;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the worker's origin.
    pub url: String,

    /// Generation to read (default: the worker's current generation).
    #[serde(default)]
    pub generation: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetOutput {
    pub generation: String,
    pub response: ResponseView,
}

pub async fn get_impl(
    worker: &ServiceWorker, cache: &CacheDb, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url, &worker.config().origin).map_err(|e| HostError::InvalidInput(e.to_string()))?;
    let generation = params.generation.unwrap_or_else(|| worker.generation().to_string());

    let response = cache
        .get_entry_by_url(&generation, url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{url} in {generation}")))?;

    json_result(&CacheGetOutput { generation, response: ResponseView::from(&response) })
}
