//! MCP tools exposed by the host.
//!
//! `sw_*` tools deliver lifecycle signals to the worker; `cache_*` tools
//! inspect the store.

pub mod cache;
pub mod fetch;
pub mod lifecycle;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::HostError;

/// Encode `output` as the pretty JSON text content of a successful result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| HostError::EncodeFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
