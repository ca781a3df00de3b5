//! Cache generations: seeding on install, purging stale ones on activation.

use futures_util::future::join_all;
use serde::Serialize;
use url::Url;

use crate::fetch::same_origin;
use crate::worker::context::CacheContext;
use precache_core::{Diagnostic, Error, RequestMode, ResourceRequest, ResourceResponse};

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub cached: Vec<String>,
    /// Seeds that failed under the lenient policy.
    pub failed: Vec<String>,
}

/// Outcome of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub generation: String,
    pub deleted: Vec<String>,
    /// Stale generations that could not be deleted.
    pub failed: Vec<String>,
}

/// Owns the current generation name and the seed list.
#[derive(Clone)]
pub struct GenerationManager {
    ctx: CacheContext,
    origin: Url,
    seeds: Vec<Url>,
    strict: bool,
}

impl GenerationManager {
    pub fn new(ctx: CacheContext, origin: Url, seeds: Vec<Url>, strict: bool) -> Self {
        Self { ctx, origin, seeds, strict }
    }

    pub fn current(&self) -> &str {
        &self.ctx.generation
    }

    pub fn seeds(&self) -> &[Url] {
        &self.seeds
    }

    fn seed_request(&self, url: &Url) -> ResourceRequest {
        let mode = if same_origin(url, &self.origin) { RequestMode::SameOrigin } else { RequestMode::Cors };
        ResourceRequest::get(url.clone()).with_mode(mode)
    }

    async fn fetch_seed(&self, request: &ResourceRequest) -> Result<ResourceResponse, Error> {
        let response = self.ctx.network.fetch(request).await?;
        if !response.is_success() {
            return Err(Error::UnexpectedStatus(response.status));
        }
        Ok(response)
    }

    /// Fetch every seed and commit them to the current generation in one
    /// transaction.
    ///
    /// Under the strict policy a single failed seed fails the whole install
    /// and nothing is written. Under the lenient policy failures are reported
    /// and the remaining seeds are still committed.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let generation = self.current().to_string();
        self.ctx.report(Diagnostic::Installing { generation: generation.clone(), seeds: self.seeds.len() });

        let requests: Vec<ResourceRequest> = self.seeds.iter().map(|url| self.seed_request(url)).collect();
        let results = join_all(requests.iter().map(|request| self.fetch_seed(request))).await;

        let mut entries = Vec::with_capacity(requests.len());
        let mut failed = Vec::new();
        for (request, result) in requests.into_iter().zip(results) {
            let url = request.url.to_string();
            match result {
                Ok(response) => entries.push((request, response)),
                Err(e) => {
                    self.ctx.report(Diagnostic::SeedFailed {
                        generation: generation.clone(),
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                    if self.strict {
                        return Err(Error::SeedFailed { url, source: Box::new(e) });
                    }
                    failed.push(url);
                }
            }
        }

        // put_all creates the generation in the same transaction as its entries
        if entries.is_empty() {
            self.ctx.store.open_generation(&generation).await?;
        } else {
            self.ctx.store.put_all(&generation, &entries).await?;
        }

        let cached: Vec<String> = entries.iter().map(|(request, _)| request.url.to_string()).collect();
        for url in &cached {
            self.ctx.report(Diagnostic::SeedCached { generation: generation.clone(), url: url.clone() });
        }
        self.ctx.report(Diagnostic::InstallComplete { generation: generation.clone(), cached: cached.len() });

        Ok(InstallReport { generation, cached, failed })
    }

    /// Delete every generation other than the current one.
    ///
    /// Deletions run concurrently and independently; a failure is reported
    /// and recorded without stopping the others.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let generation = self.current().to_string();
        self.ctx.report(Diagnostic::Activating { generation: generation.clone() });

        let stale: Vec<String> = self
            .ctx
            .store
            .generation_names()
            .await?
            .into_iter()
            .filter(|name| *name != generation)
            .collect();

        let results = join_all(stale.iter().map(|name| self.ctx.store.delete_generation(name))).await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    self.ctx.report(Diagnostic::GenerationDeleted { generation: name.clone() });
                    deleted.push(name);
                }
                Err(e) => {
                    self.ctx.report(Diagnostic::DeleteFailed { generation: name.clone(), reason: e.to_string() });
                    failed.push(name);
                }
            }
        }

        self.ctx.report(Diagnostic::ActivationComplete { generation: generation.clone(), deleted: deleted.len() });
        Ok(ActivationReport { generation, deleted, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{
        FailDeleteStore, RejectBatchStore, StubNetwork, context, html, local, origin, status,
    };
    use precache_core::{CacheDb, CacheStore};
    use std::sync::Arc;

    fn seeds(paths: &[&str]) -> Vec<Url> {
        paths.iter().map(|p| origin().join(p).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_install_seeds_current_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(StubNetwork::new());
        network.respond("/", html("/", "<h1>root</h1>"));
        network.respond("/index.html", html("/index.html", "<h1>index</h1>"));
        let (ctx, _) = context("todo-app-v3", Arc::new(db.clone()), network);
        let manager = GenerationManager::new(ctx, origin(), seeds(&["./", "./index.html"]), true);

        let report = manager.install().await.unwrap();

        assert_eq!(report.cached, vec!["http://localhost:8080/", "http://localhost:8080/index.html"]);
        assert!(report.failed.is_empty());
        assert_eq!(
            db.get("todo-app-v3", &local("/")).await.unwrap(),
            Some(html("/", "<h1>root</h1>"))
        );
    }

    #[tokio::test]
    async fn test_strict_install_is_atomic() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(StubNetwork::new());
        network.respond("/", html("/", "root"));
        network.fail("https://cdn.tailwindcss.com/");
        let (ctx, reporter) = context("todo-app-v2", Arc::new(db.clone()), network);
        let mut urls = seeds(&["./"]);
        urls.push(Url::parse("https://cdn.tailwindcss.com").unwrap());
        let manager = GenerationManager::new(ctx, origin(), urls, true);

        let result = manager.install().await;

        assert!(matches!(result, Err(Error::SeedFailed { ref url, .. }) if url == "https://cdn.tailwindcss.com/"));
        assert!(db.generation_names().await.unwrap().is_empty());
        assert!(db.get("todo-app-v2", &local("/")).await.unwrap().is_none());
        assert!(reporter.events().iter().any(|e| matches!(e, Diagnostic::SeedFailed { .. })));
    }

    #[tokio::test]
    async fn test_non_2xx_seed_fails_install() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(StubNetwork::new());
        network.respond("/manifest.json", status("/manifest.json", 404));
        let (ctx, _) = context("v1", Arc::new(db), network);
        let manager = GenerationManager::new(ctx, origin(), seeds(&["./manifest.json"]), true);

        let result = manager.install().await;
        assert!(matches!(result, Err(Error::SeedFailed { source, .. }) if matches!(*source, Error::UnexpectedStatus(404))));
    }

    #[tokio::test]
    async fn test_seed_failure_keeps_cause() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(StubNetwork::new());
        network.time_out("/index.html");
        let (ctx, _) = context("v1", Arc::new(db), network);
        let manager = GenerationManager::new(ctx, origin(), seeds(&["./index.html"]), true);

        let result = manager.install().await;
        assert!(matches!(result, Err(Error::SeedFailed { source, .. }) if matches!(*source, Error::FetchTimeout(_))));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_no_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(StubNetwork::new());
        network.respond("/", html("/", "root"));
        let (ctx, _) = context("v1", Arc::new(RejectBatchStore::new(db.clone())), network);
        let manager = GenerationManager::new(ctx, origin(), seeds(&["./"]), true);

        assert!(manager.install().await.is_err());
        assert!(db.generation_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lenient_install_keeps_successful_seeds() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(StubNetwork::new());
        network.respond("/", html("/", "root"));
        network.fail("/browserconfig.xml");
        let (ctx, _) = context("v1", Arc::new(db.clone()), network);
        let manager = GenerationManager::new(ctx, origin(), seeds(&["./", "./browserconfig.xml"]), false);

        let report = manager.install().await.unwrap();

        assert_eq!(report.cached, vec!["http://localhost:8080/"]);
        assert_eq!(report.failed, vec!["http://localhost:8080/browserconfig.xml"]);
        assert!(db.get("v1", &local("/")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_seed_list_still_creates_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (ctx, _) = context("v1", Arc::new(db.clone()), Arc::new(StubNetwork::new()));
        let manager = GenerationManager::new(ctx, origin(), Vec::new(), true);

        manager.install().await.unwrap();

        assert_eq!(db.generation_names().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_generations() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("v1").await.unwrap();
        db.put("v1", &local("/"), &html("/", "old")).await.unwrap();
        db.open_generation("v2").await.unwrap();
        let (ctx, _) = context("v2", Arc::new(db.clone()), Arc::new(StubNetwork::new()));
        let manager = GenerationManager::new(ctx, origin(), Vec::new(), true);

        let report = manager.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["v1".to_string()]);
        assert_eq!(db.generation_names().await.unwrap(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_continues_past_delete_failure() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["v1", "v2", "v3"] {
            db.open_generation(name).await.unwrap();
        }
        let store = Arc::new(FailDeleteStore::new(db.clone(), "v1"));
        let (ctx, reporter) = context("v3", store, Arc::new(StubNetwork::new()));
        let manager = GenerationManager::new(ctx, origin(), Vec::new(), true);

        let report = manager.activate().await.unwrap();

        assert_eq!(report.failed, vec!["v1".to_string()]);
        assert_eq!(report.deleted, vec!["v2".to_string()]);
        let mut remaining = db.generation_names().await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["v1".to_string(), "v3".to_string()]);
        assert!(reporter.events().iter().any(|e| matches!(e, Diagnostic::DeleteFailed { generation, .. } if generation == "v1")));
    }
}
