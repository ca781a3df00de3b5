//! sw_fetch: deliver one request to the worker's fetch handler.

use precache_client::fetch::{canonicalize, same_origin};
use precache_client::{FetchDisposition, ServiceWorker};
use precache_core::{RequestMode, ResourceRequest, ResourceResponse, ResponseSource};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::HostError;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the worker's origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode. Defaults to "same-origin" for local URLs and "cors" otherwise.
    #[serde(default)]
    pub mode: Option<RequestMode>,
}

fn default_method() -> String {
    "GET".into()
}

/// A response as shown to the host. Text bodies are inlined.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseView {
    pub url: String,
    pub status: u16,
    pub kind: &'static str,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl From<&ResourceResponse> for ResponseView {
    fn from(response: &ResourceResponse) -> Self {
        let textual = response
            .content_type()
            .is_some_and(|ct| ct.starts_with("text/") || ct.contains("json") || ct.contains("xml"));
        Self {
            url: response.url.clone(),
            status: response.status,
            kind: response.kind.as_str(),
            headers: response.headers.clone(),
            body_len: response.body.len(),
            body: textual.then(|| String::from_utf8_lossy(&response.body).into_owned()),
        }
    }
}

/// Output of sw_fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "disposition", rename_all = "lowercase")]
pub enum FetchOutput {
    /// The worker did not intercept; the host performs the request itself.
    Bypass { request: String },
    Respond { source: ResponseSource, response: ResponseView },
}

fn build_request(worker: &ServiceWorker, params: &FetchParams) -> Result<ResourceRequest, HostError> {
    let origin = &worker.config().origin;
    let url = canonicalize(&params.url, origin).map_err(|e| HostError::InvalidInput(e.to_string()))?;

    let method = params.method.trim();
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(HostError::InvalidInput(format!("invalid method: {:?}", params.method)));
    }

    let mode = params.mode.unwrap_or(if same_origin(&url, origin) { RequestMode::SameOrigin } else { RequestMode::Cors });
    Ok(ResourceRequest::new(method, url, mode))
}

pub async fn fetch_impl(worker: &ServiceWorker, params: FetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(worker, &params)?;

    let output = match worker.fetch(&request).await? {
        FetchDisposition::Bypass => FetchOutput::Bypass { request: request.to_string() },
        FetchDisposition::Respond(served) => {
            FetchOutput::Respond { source: served.source, response: ResponseView::from(&served.response) }
        }
    };
    json_result(&output)
}
