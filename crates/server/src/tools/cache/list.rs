//! cache_generations tool implementation.

use precache_client::ServiceWorker;
use precache_core::{CacheDb, EntryMeta};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize)]
pub struct GenerationView {
    pub name: String,
    pub current: bool,
    pub entries: Vec<EntryMeta>,
}

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationsOutput {
    pub current: String,
    pub generations: Vec<GenerationView>,
}

pub async fn generations_impl(worker: &ServiceWorker, cache: &CacheDb) -> Result<CallToolResult, McpError> {
    let current = worker.generation().to_string();

    let mut generations = Vec::new();
    for name in cache.generation_names().await? {
        let entries = cache.list_entries(&name).await?;
        let is_current = name == current;
        generations.push(GenerationView { name, current: is_current, entries });
    }

    json_result(&GenerationsOutput { current, generations })
}
