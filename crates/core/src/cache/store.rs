//! The key-value store contract the worker is written against.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::hash::request_key;
use crate::{Error, ResourceRequest, ResourceResponse};

/// Generation-scoped response store.
///
/// Implementations must tolerate concurrent calls from many request tasks.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if absent.
    async fn open_generation(&self, generation: &str) -> Result<(), Error>;

    /// Names of every generation currently present.
    async fn generation_names(&self) -> Result<Vec<String>, Error>;

    /// Remove a generation with all of its entries. False if it was absent.
    async fn delete_generation(&self, generation: &str) -> Result<bool, Error>;

    async fn get(&self, generation: &str, request: &ResourceRequest) -> Result<Option<ResourceResponse>, Error>;

    /// Store a response, replacing any previous entry for the request.
    ///
    /// Never creates a generation: returns `false` and writes nothing when
    /// `generation` is absent.
    async fn put(&self, generation: &str, request: &ResourceRequest, response: &ResourceResponse)
    -> Result<bool, Error>;

    /// Store all entries atomically, creating the generation if absent.
    async fn put_all(&self, generation: &str, entries: &[(ResourceRequest, ResourceResponse)]) -> Result<(), Error>;
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open_generation(&self, generation: &str) -> Result<(), Error> {
        CacheDb::open_generation(self, generation).await
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        CacheDb::generation_names(self).await
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        CacheDb::delete_generation(self, generation).await
    }

    async fn get(&self, generation: &str, request: &ResourceRequest) -> Result<Option<ResourceResponse>, Error> {
        self.get_entry(generation, &request_key(request)).await
    }

    async fn put(
        &self, generation: &str, request: &ResourceRequest, response: &ResourceResponse,
    ) -> Result<bool, Error> {
        self.put_entry(generation, request, response).await
    }

    async fn put_all(&self, generation: &str, entries: &[(ResourceRequest, ResourceResponse)]) -> Result<(), Error> {
        self.put_entries(generation, entries).await
    }
}
