//! Fetch strategies.
//!
//! Both strategies answer a request with a response or an error and may
//! populate the current generation as a side effect. Re-running a strategy
//! with the same request and network state stores the same entry.

pub mod cache_first;
pub mod network_first;

use async_trait::async_trait;

use precache_core::{Error, ResourceRequest, Served};

pub use cache_first::CacheFirst;
pub use network_first::NetworkFirst;

#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn respond(&self, request: &ResourceRequest) -> Result<Served, Error>;
}
