//! State shared by every component that touches the current generation.

use std::sync::Arc;

use crate::fetch::Network;
use crate::worker::persist::Persister;
use precache_core::{CacheStore, Diagnostic, Error, Reporter, ResourceRequest, ResourceResponse};

/// Handles to the store, the network and the reporter, bound to one generation.
#[derive(Clone)]
pub struct CacheContext {
    pub generation: Arc<str>,
    pub store: Arc<dyn CacheStore>,
    pub network: Arc<dyn Network>,
    pub reporter: Arc<dyn Reporter>,
    pub persister: Persister,
}

impl CacheContext {
    pub fn new(
        generation: impl Into<Arc<str>>, store: Arc<dyn CacheStore>, network: Arc<dyn Network>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let persister = Persister::new(Arc::clone(&store), Arc::clone(&reporter));
        Self { generation: generation.into(), store, network, reporter, persister }
    }

    pub fn report(&self, event: Diagnostic) {
        self.reporter.report(event);
    }

    /// Look up `request` in the current generation.
    pub async fn lookup(&self, request: &ResourceRequest) -> Result<Option<ResourceResponse>, Error> {
        self.store.get(&self.generation, request).await
    }

    /// Look up `request`, reporting a read failure and treating it as a miss.
    pub async fn lookup_or_miss(&self, request: &ResourceRequest) -> Option<ResourceResponse> {
        match self.lookup(request).await {
            Ok(found) => found,
            Err(e) => {
                self.report(Diagnostic::StoreReadFailed { url: request.url.to_string(), reason: e.to_string() });
                None
            }
        }
    }

    /// Store a copy of `response` in the background.
    pub fn persist(&self, request: &ResourceRequest, response: &ResourceResponse) {
        self.persister.schedule(&self.generation, request, response);
    }
}
