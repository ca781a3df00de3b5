//! Offline substitutes for local requests that reached neither network nor cache.

use url::Url;

use crate::worker::context::CacheContext;
use precache_core::{Diagnostic, ResourceRequest, ResourceResponse, Served};

/// Status of the synthetic offline response (Request Timeout).
pub const OFFLINE_STATUS: u16 = 408;

/// Body of the synthetic offline response.
pub const OFFLINE_BODY: &str = "Network error";

/// Chooses what to serve when a local fetch fails.
#[derive(Debug, Clone)]
pub struct OfflineFallback {
    root_document: Url,
}

impl OfflineFallback {
    pub fn new(root_document: Url) -> Self {
        Self { root_document }
    }

    pub fn root_document(&self) -> &Url {
        &self.root_document
    }

    /// Navigations get the cached root document whatever URL they asked for.
    /// Everything else, and navigations with no cached root, get a synthetic
    /// plain-text error.
    pub async fn respond(&self, ctx: &CacheContext, request: &ResourceRequest) -> Served {
        let navigation = request.is_navigation();
        ctx.report(Diagnostic::OfflineFallback { url: request.url.to_string(), navigation });

        if navigation {
            let root = ResourceRequest::get(self.root_document.clone());
            if let Some(document) = ctx.lookup_or_miss(&root).await {
                return Served::fallback(document);
            }
        }

        Served::fallback(ResourceResponse::text(request.url.as_str(), OFFLINE_STATUS, OFFLINE_BODY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{StubNetwork, context, html, local, origin, store};
    use precache_core::{CacheStore, ResponseKind, ResponseSource};
    use std::sync::Arc;

    fn fallback() -> OfflineFallback {
        OfflineFallback::new(origin().join("/index.html").unwrap())
    }

    #[tokio::test]
    async fn test_navigation_gets_root_document() {
        let db = store("v1").await;
        let index = html("/index.html", "<h1>todo</h1>");
        db.put("v1", &local("/index.html"), &index).await.unwrap();
        let (ctx, _) = context("v1", Arc::new(db), Arc::new(StubNetwork::new()));

        let request = ResourceRequest::navigate(origin().join("/todos/42").unwrap());
        let served = fallback().respond(&ctx, &request).await;

        assert_eq!(served.source, ResponseSource::Fallback);
        assert_eq!(served.response, index);
    }

    #[tokio::test]
    async fn test_subresource_gets_synthetic_error() {
        let db = store("v1").await;
        db.put("v1", &local("/index.html"), &html("/index.html", "<h1>todo</h1>")).await.unwrap();
        let (ctx, _) = context("v1", Arc::new(db), Arc::new(StubNetwork::new()));

        let served = fallback().respond(&ctx, &local("/app.js")).await;

        assert_eq!(served.response.status, 408);
        assert_eq!(served.response.kind, ResponseKind::Synthetic);
        assert_eq!(served.response.content_type(), Some("text/plain"));
        assert_eq!(served.response.body.as_ref(), b"Network error");
    }

    #[tokio::test]
    async fn test_navigation_without_cached_root_gets_synthetic_error() {
        let db = store("v1").await;
        let (ctx, reporter) = context("v1", Arc::new(db), Arc::new(StubNetwork::new()));

        let request = ResourceRequest::navigate(origin().join("/").unwrap());
        let served = fallback().respond(&ctx, &request).await;

        assert_eq!(served.response.status, OFFLINE_STATUS);
        assert!(reporter.events().contains(&Diagnostic::OfflineFallback {
            url: "http://localhost:8080/".into(),
            navigation: true,
        }));
    }
}
