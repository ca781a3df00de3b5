//! Stubs shared by the worker tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::fetch::Network;
use crate::worker::context::CacheContext;
use precache_core::{
    CacheDb, CacheStore, Diagnostic, Error, Reporter, ResourceRequest, ResourceResponse, ResponseKind,
};

pub(crate) fn origin() -> Url {
    Url::parse("http://localhost:8080").unwrap()
}

/// Resolve a path against the test origin; absolute URLs pass through.
pub(crate) fn resolve(path_or_url: &str) -> Url {
    origin().join(path_or_url).unwrap()
}

pub(crate) fn local(path: &str) -> ResourceRequest {
    ResourceRequest::get(resolve(path))
}

pub(crate) fn external(url: &str) -> ResourceRequest {
    ResourceRequest::get(Url::parse(url).unwrap()).with_mode(precache_core::RequestMode::Cors)
}

pub(crate) fn html(path: &str, body: &'static str) -> ResourceResponse {
    ResourceResponse {
        url: resolve(path).to_string(),
        status: 200,
        kind: ResponseKind::Basic,
        headers: vec![("content-type".into(), "text/html; charset=utf-8".into())],
        body: Bytes::from_static(body.as_bytes()),
    }
}

pub(crate) fn status(path_or_url: &str, status: u16) -> ResourceResponse {
    ResourceResponse {
        url: resolve(path_or_url).to_string(),
        status,
        kind: ResponseKind::Basic,
        headers: vec![("content-type".into(), "text/plain".into())],
        body: Bytes::from_static(b"error"),
    }
}

pub(crate) fn font(url: &str, kind: ResponseKind, body: &'static [u8]) -> ResourceResponse {
    ResourceResponse {
        url: url.to_string(),
        status: 200,
        kind,
        headers: vec![("content-type".into(), "font/woff2".into())],
        body: Bytes::from_static(body),
    }
}

/// In-memory store with `generation` already created.
pub(crate) async fn store(generation: &str) -> CacheDb {
    let db = CacheDb::open_in_memory().await.unwrap();
    db.open_generation(generation).await.unwrap();
    db
}

pub(crate) fn context(
    generation: &str, store: Arc<dyn CacheStore>, network: Arc<dyn Network>,
) -> (CacheContext, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::default());
    (CacheContext::new(generation, store, network, reporter.clone()), reporter)
}

/// Keeps every reported event in order.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: Diagnostic) {
        self.events.lock().unwrap().push(event);
    }
}

enum Stub {
    Respond(ResourceResponse),
    Fail,
    TimeOut,
}

/// Network with canned answers per URL. Unknown URLs fail like an offline host.
#[derive(Default)]
pub(crate) struct StubNetwork {
    routes: Mutex<HashMap<String, Stub>>,
    calls: AtomicUsize,
}

impl StubNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, path_or_url: &str, response: ResourceResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(resolve(path_or_url).to_string(), Stub::Respond(response));
    }

    pub(crate) fn fail(&self, path_or_url: &str) {
        self.routes.lock().unwrap().insert(resolve(path_or_url).to_string(), Stub::Fail);
    }

    pub(crate) fn time_out(&self, path_or_url: &str) {
        self.routes.lock().unwrap().insert(resolve(path_or_url).to_string(), Stub::TimeOut);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResourceResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.routes.lock().unwrap().get(request.url.as_str()) {
            Some(Stub::Respond(response)) => Ok(response.clone()),
            Some(Stub::TimeOut) => Err(Error::FetchTimeout(format!("{}: operation timed out", request.url))),
            Some(Stub::Fail) | None => Err(Error::Network(format!("{}: connection refused", request.url))),
        }
    }
}

fn unavailable() -> Error {
    Error::Database(tokio_rusqlite::Error::ConnectionClosed)
}

/// A store whose every operation fails.
pub(crate) struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn open_generation(&self, _generation: &str) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        Err(unavailable())
    }

    async fn delete_generation(&self, _generation: &str) -> Result<bool, Error> {
        Err(unavailable())
    }

    async fn get(&self, _generation: &str, _request: &ResourceRequest) -> Result<Option<ResourceResponse>, Error> {
        Err(unavailable())
    }

    async fn put(&self, _g: &str, _request: &ResourceRequest, _response: &ResourceResponse) -> Result<bool, Error> {
        Err(unavailable())
    }

    async fn put_all(&self, _g: &str, _entries: &[(ResourceRequest, ResourceResponse)]) -> Result<(), Error> {
        Err(unavailable())
    }
}

/// Real store that refuses to delete one generation.
pub(crate) struct FailDeleteStore {
    inner: CacheDb,
    protected: String,
}

impl FailDeleteStore {
    pub(crate) fn new(inner: CacheDb, protected: &str) -> Self {
        Self { inner, protected: protected.to_string() }
    }
}

#[async_trait]
impl CacheStore for FailDeleteStore {
    async fn open_generation(&self, generation: &str) -> Result<(), Error> {
        self.inner.open_generation(generation).await
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.inner.generation_names().await
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        if generation == self.protected {
            return Err(unavailable());
        }
        self.inner.delete_generation(generation).await
    }

    async fn get(&self, generation: &str, request: &ResourceRequest) -> Result<Option<ResourceResponse>, Error> {
        CacheStore::get(&self.inner, generation, request).await
    }

    async fn put(
        &self, generation: &str, request: &ResourceRequest, response: &ResourceResponse,
    ) -> Result<bool, Error> {
        CacheStore::put(&self.inner, generation, request, response).await
    }

    async fn put_all(&self, generation: &str, entries: &[(ResourceRequest, ResourceResponse)]) -> Result<(), Error> {
        self.inner.put_entries(generation, entries).await
    }
}

/// A store whose writes never finish in test time.
pub(crate) struct SlowStore;

#[async_trait]
impl CacheStore for SlowStore {
    async fn open_generation(&self, _generation: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        Ok(Vec::new())
    }

    async fn delete_generation(&self, _generation: &str) -> Result<bool, Error> {
        Ok(false)
    }

    async fn get(&self, _generation: &str, _request: &ResourceRequest) -> Result<Option<ResourceResponse>, Error> {
        Ok(None)
    }

    async fn put(&self, _g: &str, _request: &ResourceRequest, _response: &ResourceResponse) -> Result<bool, Error> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(true)
    }

    async fn put_all(&self, _g: &str, _entries: &[(ResourceRequest, ResourceResponse)]) -> Result<(), Error> {
        Ok(())
    }
}

/// Real store whose batch commits always fail.
pub(crate) struct RejectBatchStore {
    inner: CacheDb,
}

impl RejectBatchStore {
    pub(crate) fn new(inner: CacheDb) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CacheStore for RejectBatchStore {
    async fn open_generation(&self, generation: &str) -> Result<(), Error> {
        self.inner.open_generation(generation).await
    }

    async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.inner.generation_names().await
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        self.inner.delete_generation(generation).await
    }

    async fn get(&self, generation: &str, request: &ResourceRequest) -> Result<Option<ResourceResponse>, Error> {
        CacheStore::get(&self.inner, generation, request).await
    }

    async fn put(
        &self, generation: &str, request: &ResourceRequest, response: &ResourceResponse,
    ) -> Result<bool, Error> {
        CacheStore::put(&self.inner, generation, request, response).await
    }

    async fn put_all(&self, _g: &str, _entries: &[(ResourceRequest, ResourceResponse)]) -> Result<(), Error> {
        Err(unavailable())
    }
}
