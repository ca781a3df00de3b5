//! Request and response model shared by the worker, the store and the host.
//!
//! A [`ResourceResponse`] is an immutable snapshot: stored entries are never
//! mutated in place, a put replaces the whole value for its key.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How the client issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    SameOrigin,
    Cors,
    /// Cross-origin request whose response the client cannot inspect.
    NoCors,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::Cors => "cors",
            RequestMode::NoCors => "no-cors",
        }
    }
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "cors" => Ok(RequestMode::Cors),
            "no-cors" => Ok(RequestMode::NoCors),
            other => Err(Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
}

impl ResourceRequest {
    pub fn new(method: impl Into<String>, url: Url, mode: RequestMode) -> Self {
        Self { method: method.into().to_ascii_uppercase(), url, mode }
    }

    /// A plain sub-resource GET.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::SameOrigin)
    }

    /// A page navigation GET.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_read(&self) -> bool {
        self.method == "GET"
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Whether the response content can be read by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin network response.
    Basic,
    /// Cross-origin response the client may read.
    Cors,
    /// Cross-origin response stored and replayed as-is, never introspected.
    Opaque,
    /// Made locally rather than received from the network.
    Synthetic,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Synthetic => "synthetic",
        }
    }
}

impl FromStr for ResponseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseKind::Basic),
            "cors" => Ok(ResponseKind::Cors),
            "opaque" => Ok(ResponseKind::Opaque),
            "synthetic" => Ok(ResponseKind::Synthetic),
            other => Err(Error::CorruptEntry(format!("unknown response kind: {other}"))),
        }
    }
}

/// A response snapshot: status, headers and body at the time it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    pub url: String,
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResourceResponse {
    /// A locally made plain-text response.
    pub fn text(url: impl Into<String>, status: u16, body: &'static str) -> Self {
        Self {
            url: url.into(),
            status,
            kind: ResponseKind::Synthetic,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    /// Status 200 exactly.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == ResponseKind::Opaque
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Offline substitute: the cached root document or a synthetic error.
    Fallback,
}

/// A response together with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: ResourceResponse,
    pub source: ResponseSource,
}

impl Served {
    pub fn network(response: ResourceResponse) -> Self {
        Self { response, source: ResponseSource::Network }
    }

    pub fn cache(response: ResourceResponse) -> Self {
        Self { response, source: ResponseSource::Cache }
    }

    pub fn fallback(response: ResourceResponse) -> Self {
        Self { response, source: ResponseSource::Fallback }
    }
}
