//! Network-first with cache fallback, for cross-origin resources.

use async_trait::async_trait;

use super::FetchStrategy;
use crate::worker::classify::ExclusionFilter;
use crate::worker::context::CacheContext;
use precache_core::{Diagnostic, Error, ResourceRequest, Served};

/// Strategy for cross-origin requests.
///
/// Fonts and CDN assets change independently of the app version, so the
/// network wins whenever it answers. A 200 or opaque response is stored in
/// the background; the cached copy is only used when the network fails, and
/// a miss then surfaces the original network error.
#[derive(Clone)]
pub struct NetworkFirst {
    ctx: CacheContext,
    exclusions: ExclusionFilter,
}

impl NetworkFirst {
    pub fn new(ctx: CacheContext, exclusions: ExclusionFilter) -> Self {
        Self { ctx, exclusions }
    }
}

#[async_trait]
impl FetchStrategy for NetworkFirst {
    async fn respond(&self, request: &ResourceRequest) -> Result<Served, Error> {
        let url = request.url.to_string();
        self.ctx.report(Diagnostic::FetchingFromNetwork { url: url.clone() });

        let network_error = match self.ctx.network.fetch(request).await {
            Ok(response) => {
                if (response.is_ok() || response.is_opaque()) && !self.exclusions.matches(&request.url) {
                    self.ctx.persist(request, &response);
                }
                return Ok(Served::network(response));
            }
            Err(e) if e.is_network_failure() => e,
            Err(e) => return Err(e),
        };

        self.ctx.report(Diagnostic::NetworkFailed { url: url.clone(), reason: network_error.to_string() });
        match self.ctx.lookup_or_miss(request).await {
            Some(cached) => {
                self.ctx.report(Diagnostic::ServedFromCache { url });
                Ok(Served::cache(cached))
            }
            None => Err(network_error),
        }
    }
}
