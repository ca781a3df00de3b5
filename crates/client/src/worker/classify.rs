//! Request routing: which requests are intercepted, and how.

use url::Url;

use crate::fetch::same_origin;
use precache_core::ResourceRequest;

/// Browser-internal schemes that are never intercepted.
pub const EXCLUDED_SCHEMES: &[&str] = &[
    "chrome-extension",
    "moz-extension",
    "safari-extension",
    "devtools",
    "chrome",
    "about",
    "data",
    "blob",
];

/// How an intercepted request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the host performs the request itself.
    Skip,
    /// Same-origin: cache-first.
    Local,
    /// Cross-origin: network-first with cache fallback.
    External,
}

/// Telemetry block-list. Matching responses are served but never persisted.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    patterns: Vec<String>,
}

impl ExclusionFilter {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { patterns: patterns.into_iter().map(Into::into).filter(|p: &String| !p.is_empty()).collect() }
    }

    /// Plain substring match against the full URL.
    pub fn matches(&self, url: &Url) -> bool {
        let url = url.as_str();
        self.patterns.iter().any(|p| url.contains(p.as_str()))
    }
}

/// Decides eligibility and strategy for each request.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    origin: Url,
    exclusions: ExclusionFilter,
}

impl RequestClassifier {
    pub fn new(origin: Url, exclusions: ExclusionFilter) -> Self {
        Self { origin, exclusions }
    }

    pub fn classify(&self, request: &ResourceRequest) -> Route {
        if !request.is_read() || EXCLUDED_SCHEMES.contains(&request.url.scheme()) {
            return Route::Skip;
        }

        if same_origin(&request.url, &self.origin) { Route::Local } else { Route::External }
    }

    pub fn exclusions(&self) -> &ExclusionFilter {
        &self.exclusions
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}
