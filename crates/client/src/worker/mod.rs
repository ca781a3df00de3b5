//! The interception worker.
//!
//! [`ServiceWorker`] receives the four lifecycle signals from its host:
//!
//! - `install`: seed the current generation
//! - `activate`: purge stale generations and start intercepting
//! - `fetch`: route a request to a strategy, or hand it back to the host
//! - `sync`: run the deferred reconciliation hook
//!
//! Each returns a future that resolves once its side effects are done,
//! except cache population from `fetch`, which is detached and drained by
//! [`ServiceWorker::flush`] or [`ServiceWorker::shutdown`].

pub mod classify;
pub mod context;
pub mod fallback;
pub mod generation;
pub mod persist;
pub mod strategy;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use url::Url;

use crate::fetch::{Network, canonicalize};
use precache_core::{AppConfig, CacheStore, Error, Reporter, ResourceRequest, Served, TracingReporter};

pub use classify::{ExclusionFilter, RequestClassifier, Route};
pub use context::CacheContext;
pub use fallback::OfflineFallback;
pub use generation::{ActivationReport, GenerationManager, InstallReport};
pub use persist::Persister;
pub use strategy::{CacheFirst, FetchStrategy, NetworkFirst};
pub use sync::{BACKGROUND_SYNC_TAG, NoopSync, SyncHook, SyncOutcome, SyncProcedure};

/// Everything the worker needs to know about its deployment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Current generation name.
    pub version: String,
    pub origin: Url,
    pub seed_urls: Vec<String>,
    pub excluded_patterns: Vec<String>,
    pub navigation_fallback: String,
    pub strict_install: bool,
    pub sync_tag: String,
}

impl WorkerConfig {
    /// Default policy for the given version and origin.
    pub fn new(version: impl Into<String>, origin: Url) -> Self {
        let defaults = AppConfig::default();
        Self {
            version: version.into(),
            origin,
            seed_urls: defaults.seed_urls,
            excluded_patterns: defaults.excluded_patterns,
            navigation_fallback: defaults.navigation_fallback,
            strict_install: defaults.strict_install,
            sync_tag: defaults.sync_tag,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config
            .origin_url()
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            version: config.cache_version.clone(),
            origin,
            seed_urls: config.seed_urls.clone(),
            excluded_patterns: config.excluded_patterns.clone(),
            navigation_fallback: config.navigation_fallback.clone(),
            strict_install: config.strict_install,
            sync_tag: config.sync_tag.clone(),
        })
    }

    pub fn with_seeds(mut self, seeds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.seed_urls = seeds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strict_install(mut self, strict: bool) -> Self {
        self.strict_install = strict;
        self
    }

    /// Resolve a configured URL against the origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        canonicalize(input, &self.origin).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))
    }
}

/// Lifecycle position of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    /// Controls clients: fetches are intercepted.
    Activated,
    /// Install failed or the worker shut down.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// What the host should do with a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDisposition {
    /// Not intercepted; perform the request normally.
    Bypass,
    Respond(Served),
}

/// Builder for [`ServiceWorker`].
pub struct WorkerBuilder {
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    reporter: Arc<dyn Reporter>,
    sync_procedure: Arc<dyn SyncProcedure>,
}

impl WorkerBuilder {
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn sync_procedure(mut self, procedure: Arc<dyn SyncProcedure>) -> Self {
        self.sync_procedure = procedure;
        self
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if a seed or the navigation fallback does
    /// not resolve against the origin.
    pub fn build(self) -> Result<ServiceWorker, Error> {
        let config = self.config;
        let seeds = config
            .seed_urls
            .iter()
            .map(|seed| config.resolve(seed))
            .collect::<Result<Vec<_>, _>>()?;
        let root_document = config.resolve(&config.navigation_fallback)?;

        let ctx = CacheContext::new(config.version.as_str(), self.store, self.network, Arc::clone(&self.reporter));
        let exclusions = ExclusionFilter::new(config.excluded_patterns.iter().cloned());
        let classifier = RequestClassifier::new(config.origin.clone(), exclusions.clone());
        let generations = GenerationManager::new(ctx.clone(), config.origin.clone(), seeds, config.strict_install);
        let cache_first = CacheFirst::new(ctx.clone(), exclusions.clone(), OfflineFallback::new(root_document));
        let network_first = NetworkFirst::new(ctx.clone(), exclusions);
        let sync = SyncHook::new(config.sync_tag.clone(), self.sync_procedure, self.reporter);
        let (state, _) = watch::channel(WorkerState::Parsed);

        Ok(ServiceWorker {
            config,
            ctx,
            classifier,
            generations,
            cache_first,
            network_first,
            sync,
            state,
            lifecycle: Mutex::new(()),
        })
    }
}

/// Resource-caching interception layer for one application origin.
pub struct ServiceWorker {
    config: WorkerConfig,
    ctx: CacheContext,
    classifier: RequestClassifier,
    generations: GenerationManager,
    cache_first: CacheFirst,
    network_first: NetworkFirst,
    sync: SyncHook,
    state: watch::Sender<WorkerState>,
    lifecycle: Mutex<()>,
}

impl ServiceWorker {
    pub fn builder(config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> WorkerBuilder {
        WorkerBuilder {
            config,
            store,
            network,
            reporter: Arc::new(TracingReporter),
            sync_procedure: Arc::new(NoopSync),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Name of the generation this worker reads and writes.
    pub fn generation(&self) -> &str {
        self.generations.current()
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WorkerState) {
        tracing::debug!(generation = self.generation(), %state, "worker state changed");
        self.state.send_replace(state);
    }

    /// Handle the `install` signal.
    ///
    /// Allowed from `parsed`, or from `redundant` to retry a failed install.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if !matches!(state, WorkerState::Parsed | WorkerState::Redundant) {
            return Err(Error::InvalidState(format!("cannot install while {state}")));
        }

        self.set_state(WorkerState::Installing);
        match self.generations.install().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Handle the `activate` signal.
    ///
    /// Only an installed worker may activate, so a generation is never
    /// activated before it is fully seeded. On success the worker starts
    /// intercepting fetches.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _lifecycle = self.lifecycle.lock().await;
        let state = self.state();
        if state != WorkerState::Installed {
            return Err(Error::InvalidState(format!("cannot activate while {state}")));
        }

        self.set_state(WorkerState::Activating);
        match self.generations.activate().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated);
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed);
                Err(e)
            }
        }
    }

    /// Install then activate without waiting, as a freshly deployed worker does.
    pub async fn start(&self) -> Result<(InstallReport, ActivationReport), Error> {
        let installed = self.install().await?;
        let activated = self.activate().await?;
        Ok((installed, activated))
    }

    /// Handle the `fetch` signal.
    ///
    /// Requests are only intercepted once the worker is activated.
    pub async fn fetch(&self, request: &ResourceRequest) -> Result<FetchDisposition, Error> {
        if self.state() != WorkerState::Activated {
            return Ok(FetchDisposition::Bypass);
        }

        let served = match self.classifier.classify(request) {
            Route::Skip => return Ok(FetchDisposition::Bypass),
            Route::Local => self.cache_first.respond(request).await?,
            Route::External => self.network_first.respond(request).await?,
        };
        Ok(FetchDisposition::Respond(served))
    }

    /// Handle the `sync` signal.
    pub async fn sync(&self, tag: &str) -> Result<SyncOutcome, Error> {
        self.sync.on_sync(tag).await
    }

    /// Wait for all background cache writes scheduled so far.
    pub async fn flush(&self) {
        self.ctx.persister.flush().await;
    }

    /// Stop intercepting and drain pending writes for at most `timeout`.
    ///
    /// Returns the number of writes aborted.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let _lifecycle = self.lifecycle.lock().await;
        self.set_state(WorkerState::Redundant);
        self.ctx.persister.drain(timeout).await
    }
}
