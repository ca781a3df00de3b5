//! Cache-first: serve from the current generation, fill it from the network.

use async_trait::async_trait;

use super::FetchStrategy;
use crate::worker::classify::ExclusionFilter;
use crate::worker::context::CacheContext;
use crate::worker::fallback::OfflineFallback;
use precache_core::{Diagnostic, Error, ResourceRequest, Served};

/// Strategy for same-origin requests.
///
/// A hit never touches the network. A miss goes to the network; a 200 that
/// is not exclusion-filtered is stored in the background. Network failures
/// are answered by the offline fallback.
#[derive(Clone)]
pub struct CacheFirst {
    ctx: CacheContext,
    exclusions: ExclusionFilter,
    fallback: OfflineFallback,
}

impl CacheFirst {
    pub fn new(ctx: CacheContext, exclusions: ExclusionFilter, fallback: OfflineFallback) -> Self {
        Self { ctx, exclusions, fallback }
    }
}

#[async_trait]
impl FetchStrategy for CacheFirst {
    async fn respond(&self, request: &ResourceRequest) -> Result<Served, Error> {
        let url = request.url.to_string();

        if let Some(cached) = self.ctx.lookup_or_miss(request).await {
            self.ctx.report(Diagnostic::ServedFromCache { url });
            return Ok(Served::cache(cached));
        }

        self.ctx.report(Diagnostic::FetchingFromNetwork { url: url.clone() });
        match self.ctx.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() && !self.exclusions.matches(&request.url) {
                    self.ctx.persist(request, &response);
                }
                Ok(Served::network(response))
            }
            Err(e) if e.is_network_failure() => {
                self.ctx.report(Diagnostic::NetworkFailed { url, reason: e.to_string() });
                Ok(self.fallback.respond(&self.ctx, request).await)
            }
            Err(e) => Err(e),
        }
    }
}
